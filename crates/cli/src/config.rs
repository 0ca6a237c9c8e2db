//! CLI configuration file

use std::path::Path;

use serde::{Deserialize, Serialize};
use ssc_checker::{CheckerConfig, WebDriverConfig};

/// Contents of `ssc.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SscConfig {
    pub webdriver: WebDriverConfig,
    pub checker: CheckerConfig,
}

impl SscConfig {
    /// Load configuration from file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}
