//! Browser driver collaborator
//!
//! The interpreter never talks to a browser directly. Everything it needs is
//! expressed by [`Driver`]; [`crate::webdriver::WebDriver`] implements it over
//! the WebDriver protocol and tests provide scripted in-memory browsers.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::locator::Locator;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("No alert is open")]
    NoSuchAlert,

    #[error("Stale element: {0}")]
    StaleElement(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Session error: {0}")]
    Session(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// One console log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            message: message.into(),
        }
    }
}

/// Operations the interpreter performs against a browser session.
///
/// A driver owns exactly one session with one active browsing context.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Handle to a located element
    type Element: Clone + Debug + Send + Sync;

    /// Load `url` in the active context and wait for it to finish loading
    async fn goto(&self, url: &str) -> DriverResult<()>;

    async fn current_url(&self) -> DriverResult<String>;

    /// Outer HTML of the document element
    async fn outer_html(&self) -> DriverResult<String>;

    /// All elements currently matching `locator`, without waiting
    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Self::Element>>;

    /// All descendants of `parent` matching `locator`, without waiting
    async fn find_all_in(
        &self,
        parent: &Self::Element,
        locator: &Locator,
    ) -> DriverResult<Vec<Self::Element>>;

    /// Wait until `locator` matches at least one element
    async fn wait_located(&self, locator: &Locator, timeout: Duration) -> DriverResult<Self::Element>;

    /// Wait until `element` is displayed
    async fn wait_visible(&self, element: &Self::Element, timeout: Duration) -> DriverResult<Self::Element>;

    async fn is_displayed(&self, element: &Self::Element) -> DriverResult<bool>;

    async fn tag_name(&self, element: &Self::Element) -> DriverResult<String>;

    async fn attribute(&self, element: &Self::Element, name: &str) -> DriverResult<Option<String>>;

    /// Rendered inner text
    async fn text(&self, element: &Self::Element) -> DriverResult<String>;

    /// Checked state for checkboxes and radios, selection for options
    async fn is_selected(&self, element: &Self::Element) -> DriverResult<bool>;

    async fn click(&self, element: &Self::Element) -> DriverResult<()>;

    async fn send_keys(&self, element: &Self::Element, text: &str) -> DriverResult<()>;

    async fn clear(&self, element: &Self::Element) -> DriverResult<()>;

    /// Entries logged since the previous call
    async fn console_logs(&self) -> DriverResult<Vec<LogEntry>>;

    /// Make the frame matched by `locator` the active context
    async fn switch_to_frame(&self, locator: &Locator) -> DriverResult<()>;

    /// Make the top-level document the active context
    async fn switch_to_default_frame(&self) -> DriverResult<()>;

    /// Wait up to `timeout` for a native dialog and accept it
    async fn accept_alert(&self, timeout: Duration) -> DriverResult<()>;

    /// Wait up to `timeout` for a native dialog and dismiss it
    async fn dismiss_alert(&self, timeout: Duration) -> DriverResult<()>;
}
