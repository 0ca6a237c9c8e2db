//! Failure decoration with page context

use tracing::warn;

use crate::driver::Driver;
use crate::error::{CheckError, StepFailure};
use crate::scenario::Step;

/// Wrap `error` with the current URL, the failing step and an HTML snapshot.
///
/// In debug mode, and for errors that already carry page context, the error
/// is returned untouched.
pub async fn report<D: Driver>(driver: &D, step: &Step, error: CheckError, debug: bool) -> CheckError {
    if debug || matches!(error, CheckError::Reported(_)) {
        return error;
    }

    let url = driver.current_url().await.unwrap_or_else(|e| {
        warn!(error = %e, "could not read current url for failure report");
        String::new()
    });

    let html = driver.outer_html().await.unwrap_or_else(|e| {
        warn!(error = %e, "could not capture page html for failure report");
        String::new()
    });

    let step_json = serde_json::to_string(&step.shallow()).unwrap_or_else(|e| {
        warn!(error = %e, "could not render failing step");
        String::from("{}")
    });

    CheckError::Reported(Box::new(StepFailure {
        url,
        step_json,
        html,
        source: error,
    }))
}
