//! SSC scenario checker
//!
//! Interprets declarative browser acceptance scenarios: an ordered tree of
//! steps that navigate, act on the page and assert on what it shows, run
//! against a [`Driver`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Checker::run(steps)                                        │
//! │    for each step:                                           │
//! │      resolve placeholders ──> Step (shallow copy)           │
//! │      execif      ──> condition::evaluate ──> holds          │
//! │      url / link  ──> Driver::goto ──> logs::scan            │
//! │      actions     ──> Actions::perform                       │
//! │      checks      ──> Assertions::verify ──> logs::scan      │
//! │                        └── Poller ── extract ── compare     │
//! │      scenario    ──> recurse                                │
//! │    any error    ──> report (url, step JSON, html)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Driver (trait)                                             │
//! │    └── WebDriver (fantoccini)                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use ssc_checker::{Checker, Scenario, WebDriver, WebDriverConfig};
//!
//! # async fn example() -> ssc_checker::Result<()> {
//! let scenario = Scenario::from_yaml(
//!     r#"
//! - url: http://127.0.0.1:8080/
//! - checks:
//!     - equals: {css: h3}
//!       value: Home 001
//! "#,
//! )?;
//!
//! let driver = WebDriver::connect(&WebDriverConfig::default()).await?;
//! let summary = Checker::new(driver).run(&scenario).await?;
//! println!("{} steps", summary.steps);
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod assertion;
pub mod compare;
pub mod condition;
pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod locator;
pub mod logs;
pub mod placeholder;
pub mod poll;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod webdriver;

pub use assertion::PredicateRegistry;
pub use config::CheckerConfig;
pub use driver::{Driver, DriverError, DriverResult, LogEntry};
pub use error::{CheckError, Mismatch, Result, StepFailure};
pub use locator::Locator;
pub use placeholder::{placeholder, Deferred, Placeholder, PlaceholderValue, Placeholders, Resolve};
pub use runner::{Checker, RunSummary, StepPhase};
pub use scenario::{
    Action, Assertion, Compare, Expected, Guard, Predicate, PredicateName, Presence, Scenario, Step,
    Target, ValueKind,
};
pub use webdriver::{Browser, WebDriver, WebDriverConfig};
