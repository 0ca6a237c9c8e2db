//! Scenario runner
//!
//! Steps run strictly in order. Each step walks a fixed sequence of phases:
//!
//! ```text
//! Pending -> GuardCheck -> Navigate -> Actions -> Checks -> Nested -> Done
//!                 |
//!                 +--(false)--> Aborted: the rest of the current list is skipped
//! ```
//!
//! Phases without work for the step pass straight through. A nested scenario
//! is run as its own list, so a guard inside it never reaches the caller's
//! siblings. Placeholders are resolved one step at a time, when the step is
//! reached.
//!
//! The console is scanned after every navigation and again once the step's
//! checks have passed.

use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::action::Actions;
use crate::assertion::{Assertions, PredicateRegistry};
use crate::condition;
use crate::config::CheckerConfig;
use crate::driver::{Driver, DriverError};
use crate::error::{CheckError, Result};
use crate::logs;
use crate::placeholder::{Placeholders, Resolve};
use crate::poll::wait_element;
use crate::report::report;
use crate::scenario::Step;

/// Counters of a successful run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Steps run, nested ones included. A step whose `execif` was false
    /// counts here.
    pub steps: usize,

    /// Steps after a false `execif` that never ran
    pub skipped: usize,

    pub navigations: usize,

    pub elapsed: Duration,
}

/// Phase of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Pending,
    GuardCheck,
    Navigate,
    Actions,
    Checks,
    Nested,
    Done,
    Aborted,
}

/// Interprets scenarios against one browser session.
pub struct Checker<D: Driver> {
    driver: D,
    config: CheckerConfig,
    placeholders: Placeholders,
    predicates: PredicateRegistry,
}

impl<D: Driver> Checker<D> {
    /// Create a checker with default configuration
    pub fn new(driver: D) -> Self {
        Self::with_config(driver, CheckerConfig::default())
    }

    pub fn with_config(driver: D, config: CheckerConfig) -> Self {
        Self {
            driver,
            config,
            placeholders: Placeholders::new(),
            predicates: PredicateRegistry::new(),
        }
    }

    /// Mapping used by [`Checker::run`]
    pub fn placeholders(mut self, placeholders: Placeholders) -> Self {
        self.placeholders = placeholders;
        self
    }

    /// Propagate raw errors instead of decorating them with page context
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Make `name` available to `satisfies` assertions
    pub fn register_predicate<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.predicates.register(name, predicate);
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Run `steps` with the checker's placeholder mapping
    pub async fn run(&self, steps: &[Step]) -> Result<RunSummary> {
        self.run_with(steps, &self.placeholders).await
    }

    /// Run `steps` resolving placeholders against `placeholders`
    pub async fn run_with(&self, steps: &[Step], placeholders: &Placeholders) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::default();

        self.run_steps(steps, placeholders, &mut summary).await?;

        summary.elapsed = start.elapsed();
        debug!(
            steps = summary.steps,
            skipped = summary.skipped,
            navigations = summary.navigations,
            "scenario finished"
        );
        Ok(summary)
    }

    fn run_steps<'a>(
        &'a self,
        steps: &'a [Step],
        placeholders: &'a Placeholders,
        summary: &'a mut RunSummary,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for (index, step) in steps.iter().enumerate() {
                if self.run_step(step, placeholders, summary).await? == StepPhase::Aborted {
                    let skipped = steps.len() - index - 1;
                    info!(index, skipped, "execif is false, skipping the rest of the sequence");
                    summary.skipped += skipped;
                    break;
                }
            }
            Ok(())
        })
    }

    async fn run_step(
        &self,
        step: &Step,
        placeholders: &Placeholders,
        summary: &mut RunSummary,
    ) -> Result<StepPhase> {
        let resolved = match step.shallow().resolve(placeholders) {
            Ok(resolved) => resolved,
            Err(e) => return Err(report(&self.driver, step, e, self.config.debug).await),
        };

        let mut phase = StepPhase::Pending;
        loop {
            phase = match self.advance(step, &resolved, phase, placeholders, summary).await {
                Ok(next) => next,
                Err(e) => return Err(report(&self.driver, &resolved, e, self.config.debug).await),
            };
            debug!(?phase, "step transition");

            if matches!(phase, StepPhase::Done | StepPhase::Aborted) {
                summary.steps += 1;
                return Ok(phase);
            }
        }
    }

    /// Perform the work of `phase` and return the phase that follows it.
    /// `step` is the resolved copy of `authored`, without its nested scenario.
    async fn advance(
        &self,
        authored: &Step,
        step: &Step,
        phase: StepPhase,
        placeholders: &Placeholders,
        summary: &mut RunSummary,
    ) -> Result<StepPhase> {
        let assertions = Assertions::new(&self.driver, &self.config, &self.predicates);

        Ok(match phase {
            StepPhase::Pending if step.execif.is_some() => StepPhase::GuardCheck,
            StepPhase::Pending => StepPhase::Navigate,
            StepPhase::GuardCheck => {
                let holds = match &step.execif {
                    Some(guard) => condition::evaluate(&assertions, guard).await?,
                    None => true,
                };
                if holds {
                    StepPhase::Navigate
                } else {
                    StepPhase::Aborted
                }
            }
            StepPhase::Navigate => {
                if self.navigate(step).await? {
                    summary.navigations += 1;
                }
                StepPhase::Actions
            }
            StepPhase::Actions => {
                let actions = Actions::new(&self.driver, &self.config);
                for action in &step.actions {
                    actions.perform(action).await?;
                }
                StepPhase::Checks
            }
            StepPhase::Checks => {
                for assertion in &step.checks {
                    assertions.verify(assertion).await?;
                }
                self.scan_console().await?;
                StepPhase::Nested
            }
            StepPhase::Nested => {
                if let Some(nested) = &authored.scenario {
                    debug!(steps = nested.len(), "entering nested scenario");
                    self.run_steps(nested, placeholders, summary).await?;
                }
                StepPhase::Done
            }
            StepPhase::Done | StepPhase::Aborted => phase,
        })
    }

    /// Follow the step's `url` and `link`, then scan the console. Returns
    /// whether anything was loaded.
    async fn navigate(&self, step: &Step) -> Result<bool> {
        if step.url.is_none() && step.link.is_none() {
            return Ok(false);
        }

        // entries from before this navigation belong to the previous page
        self.scan_console().await?;

        if let Some(url) = &step.url {
            let url = self.config.resolve_url(url.get()?);
            debug!(%url, "navigating");
            self.driver.goto(&url).await?;
        }

        if let Some(link) = &step.link {
            let locator = link.get()?;
            let timeout = self.config.default_timeout();
            debug!(%locator, "following link");
            let element = wait_element(&self.driver, locator, timeout)
                .await
                .map_err(|e| match e {
                    DriverError::Timeout(_) => CheckError::NoSuchElement {
                        directive: "link".to_string(),
                        locator: locator.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    },
                    other => other.into(),
                })?;
            self.driver.click(&element).await?;
        }

        self.scan_console().await?;
        Ok(true)
    }

    /// Drain the console and fail on the first error entry for the current page.
    async fn scan_console(&self) -> Result<()> {
        let current = self.driver.current_url().await?;
        let entries = self.driver.console_logs().await?;
        match logs::scan(&current, &entries) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
