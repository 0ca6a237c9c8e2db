//! Checker configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Process-wide defaults for a [`crate::Checker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Wait timeout for assertions and actions that declare none
    pub timeout_ms: u64,

    /// Delay between polling attempts
    pub poll_interval_ms: u64,

    /// Propagate raw errors instead of decorating them with page context
    pub debug: bool,

    /// Prefix for step URLs that carry no scheme
    pub base_url: Option<String>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 4000,
            poll_interval_ms: 100,
            debug: false,
            base_url: None,
        }
    }
}

impl CheckerConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Absolute URL for a step's `url` value
    pub fn resolve_url(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) if !url.contains("://") => {
                format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/'))
            }
            _ => url.to_string(),
        }
    }
}
