//! `ssc run`: execute scenario files against a WebDriver server

use std::path::{Path, PathBuf};

use clap::Args;
use ssc_checker::{CheckerConfig, Checker, Placeholders, Scenario, WebDriver, WebDriverConfig};
use tracing::{info, warn};

use super::{scenario_files, ScenarioResult};
use crate::config::SscConfig;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct RunArgs {
    /// Scenario files or directories
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// YAML or JSON file mapping placeholder keys to values
    #[arg(long)]
    pub placeholders: Option<PathBuf>,

    /// WebDriver server URL
    #[arg(long, env = "SSC_WEBDRIVER_URL")]
    pub webdriver: Option<String>,

    /// Prefix for scenario URLs without a scheme
    #[arg(long, env = "SSC_BASE_URL")]
    pub base_url: Option<String>,

    /// Default wait timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Report raw errors without page context
    #[arg(long, env = "SSC_DEBUG")]
    pub debug: bool,
}

impl RunArgs {
    /// Apply command line overrides on top of the file configuration
    fn merge(&self, mut config: SscConfig) -> SscConfig {
        if let Some(url) = &self.webdriver {
            config.webdriver.url = url.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.checker.base_url = Some(base_url.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.checker.timeout_ms = timeout_ms;
        }
        if self.debug {
            config.checker.debug = true;
        }
        config
    }
}

pub async fn execute(args: RunArgs, config: SscConfig, format: OutputFormat) -> anyhow::Result<()> {
    let config = args.merge(config);
    let placeholders = match &args.placeholders {
        Some(path) => Placeholders::from_file(path)?,
        None => Placeholders::new(),
    };

    let files = scenario_files(&args.paths)?;
    let mut results = Vec::with_capacity(files.len());
    for file in &files {
        results.push(run_file(file, &config.webdriver, &config.checker, &placeholders).await);
    }

    let failed = results.iter().filter(|r| !r.passed).count();
    if let OutputFormat::Table = format {
        for result in results.iter().filter(|r| !r.passed) {
            if let Some(message) = &result.message {
                output::print_error(&format!("{}\n{}", result.file, message));
            }
        }
    }
    output::print_list(&results, format);

    if failed > 0 {
        if let OutputFormat::Table = format {
            output::print_error(&format!("{} of {} scenarios failed", failed, results.len()));
        }
        std::process::exit(1);
    }
    if let OutputFormat::Table = format {
        output::print_success(&format!("{} scenarios passed", results.len()));
    }
    Ok(())
}

/// Run one scenario file in a fresh browser session
async fn run_file(
    file: &Path,
    webdriver: &WebDriverConfig,
    checker: &CheckerConfig,
    placeholders: &Placeholders,
) -> ScenarioResult {
    let result = ScenarioResult::new(file);
    let scenario = match Scenario::from_file(file) {
        Ok(scenario) => scenario,
        Err(e) => return result.failed(&e),
    };

    info!(file = %file.display(), steps = scenario.len(), "running scenario");
    let driver = match WebDriver::connect(webdriver).await {
        Ok(driver) => driver,
        Err(e) => return result.failed(&e.into()),
    };

    let runner = Checker::with_config(driver, checker.clone()).placeholders(placeholders.clone());
    let outcome = runner.run(&scenario).await;

    if let Err(e) = runner.into_driver().close().await {
        warn!(file = %file.display(), "failed to close session: {}", e);
    }

    match outcome {
        Ok(summary) => ScenarioResult {
            steps: summary.steps,
            skipped: summary.skipped,
            navigations: summary.navigations,
            elapsed_ms: summary.elapsed.as_millis(),
            ..result
        },
        Err(e) => result.failed(&e),
    }
}
