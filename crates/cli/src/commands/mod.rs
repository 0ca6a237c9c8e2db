//! CLI Commands

pub mod run;
pub mod validate;

use std::path::{Path, PathBuf};

use serde::Serialize;
use ssc_checker::scenario::find_files;
use ssc_checker::CheckError;

use crate::output::{status_label, TableDisplay};

/// Expand the given paths into scenario files. Directories are walked in
/// path order; files are taken as given.
pub fn scenario_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(find_files(path));
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            anyhow::bail!("No such file or directory: {}", path.display());
        }
    }
    Ok(files)
}

/// Outcome of one scenario file
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub file: String,
    pub passed: bool,
    pub steps: usize,
    pub skipped: usize,
    pub navigations: usize,
    pub elapsed_ms: u128,
    pub error: Option<String>,

    /// Failure message without the captured page context
    pub reason: Option<String>,

    /// Full failure message as reported
    pub message: Option<String>,
}

impl ScenarioResult {
    pub fn new(file: &Path) -> Self {
        Self {
            file: file.display().to_string(),
            passed: true,
            steps: 0,
            skipped: 0,
            navigations: 0,
            elapsed_ms: 0,
            error: None,
            reason: None,
            message: None,
        }
    }

    pub fn failed(mut self, error: &CheckError) -> Self {
        self.passed = false;
        self.error = Some(error.name().to_string());
        self.reason = Some(error.root().to_string());
        self.message = Some(error.to_string());
        self
    }
}

impl TableDisplay for ScenarioResult {
    fn headers() -> Vec<&'static str> {
        vec!["File", "Status", "Steps", "Skipped", "Navigations", "Elapsed", "Error"]
    }

    fn row(&self) -> Vec<String> {
        let error = match &self.error {
            Some(name) => format!("{}: {}", name, self.reason.as_deref().unwrap_or_default()),
            None => String::new(),
        };
        vec![
            self.file.clone(),
            status_label(self.passed),
            self.steps.to_string(),
            self.skipped.to_string(),
            self.navigations.to_string(),
            format!("{} ms", self.elapsed_ms),
            error,
        ]
    }
}
