//! `ssc validate`: parse scenario files without a browser

use std::path::PathBuf;

use clap::Args;
use ssc_checker::Scenario;
use tracing::debug;

use super::{scenario_files, ScenarioResult};
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct ValidateArgs {
    /// Scenario files or directories
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

pub async fn execute(args: ValidateArgs, format: OutputFormat) -> anyhow::Result<()> {
    let files = scenario_files(&args.paths)?;
    let results: Vec<ScenarioResult> = files
        .iter()
        .map(|file| {
            let result = ScenarioResult::new(file);
            match Scenario::from_file(file) {
                Ok(scenario) => {
                    debug!(file = %file.display(), steps = scenario.len(), "scenario parsed");
                    ScenarioResult {
                        steps: scenario.len(),
                        ..result
                    }
                }
                Err(e) => result.failed(&e),
            }
        })
        .collect();

    output::print_list(&results, format);

    let invalid = results.iter().filter(|r| !r.passed).count();
    if invalid > 0 {
        if let OutputFormat::Table = format {
            output::print_error(&format!("{} of {} scenario files are invalid", invalid, results.len()));
        }
        std::process::exit(1);
    }
    if let OutputFormat::Table = format {
        output::print_success(&format!("{} scenario files are valid", results.len()));
    }
    Ok(())
}
