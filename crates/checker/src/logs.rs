//! Console log scanning

use once_cell::sync::Lazy;
use regex::Regex;

use crate::driver::LogEntry;
use crate::error::CheckError;

/// Uncaught script error names that fail a page.
pub const SCRIPT_ERRORS: [&str; 6] = [
    "SyntaxError",
    "EvalError",
    "ReferenceError",
    "RangeError",
    "TypeError",
    "URIError",
];

static STATUS_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)([45]\d\d)(?:\s|$)").unwrap());

/// First failure signature found in `entries`, in log order.
///
/// Status failures only count for entries logged against `url`
/// (`"<url> - ..."`) and for status tokens standing alone between spaces.
pub fn scan(url: &str, entries: &[LogEntry]) -> Option<CheckError> {
    let prefix = format!("{} - ", url);

    entries.iter().find_map(|entry| {
        let message = entry.message.as_str();
        if SCRIPT_ERRORS.iter().any(|signature| message.contains(signature)) {
            return Some(CheckError::Javascript(message.to_string()));
        }

        let rest = message.strip_prefix(&prefix)?;
        STATUS_CODE
            .captures_iter(rest)
            .filter_map(|caps| caps[1].parse::<u16>().ok())
            .find(|status| (400..=599).contains(status))
            .map(|status| CheckError::StatusCode {
                status,
                message: message.to_string(),
            })
    })
}
