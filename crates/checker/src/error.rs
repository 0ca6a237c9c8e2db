//! Error types for scenario checks

use std::fmt;

use thiserror::Error;

use crate::driver::DriverError;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("{directive}: waiting for element to be located {locator} timed out after {timeout_ms} ms")]
    NoSuchElement {
        directive: String,
        locator: String,
        timeout_ms: u64,
    },

    #[error("{directive}: element located by {locator} still exists after {timeout_ms} ms")]
    ElementExists {
        directive: String,
        locator: String,
        timeout_ms: u64,
    },

    #[error(transparent)]
    NotMatch(Box<Mismatch>),

    #[error("Javascript error was detected: {0}")]
    Javascript(String),

    #[error("The response error was detected (status {status}): {message}")]
    StatusCode { status: u16, message: String },

    #[error("Placeholder `{0}` is not defined")]
    MissingPlaceholder(String),

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("{0}")]
    Reported(Box<StepFailure>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CheckError>;

impl CheckError {
    /// Shorthand for a configuration error.
    pub fn invalid(message: impl Into<String>) -> Self {
        CheckError::InvalidScenario(message.into())
    }

    /// Taxonomy name of the failure. Reported errors answer with the name of
    /// the failure they wrap.
    pub fn name(&self) -> &'static str {
        match self {
            CheckError::NoSuchElement { .. } => "NoSuchElementError",
            CheckError::ElementExists { .. } => "ElementExistsError",
            CheckError::NotMatch(_) => "NotMatchError",
            CheckError::Javascript(_) => "JavascriptError",
            CheckError::StatusCode { .. } => "StatusCodeError",
            CheckError::MissingPlaceholder(_) => "MissingPlaceholderError",
            CheckError::InvalidScenario(_) => "ConfigurationError",
            CheckError::Driver(_) => "DriverError",
            CheckError::Reported(failure) => failure.source.name(),
            CheckError::Io(_) | CheckError::Json(_) | CheckError::Yaml(_) => "ParseError",
        }
    }

    /// True for authoring mistakes in the scenario itself.
    pub fn is_configuration(&self) -> bool {
        match self {
            CheckError::InvalidScenario(_) | CheckError::MissingPlaceholder(_) => true,
            CheckError::Reported(failure) => failure.source.is_configuration(),
            _ => false,
        }
    }

    /// The underlying failure, looking through the reporter wrapper.
    pub fn root(&self) -> &CheckError {
        match self {
            CheckError::Reported(failure) => failure.source.root(),
            other => other,
        }
    }
}

impl From<Mismatch> for CheckError {
    fn from(mismatch: Mismatch) -> Self {
        CheckError::NotMatch(Box::new(mismatch))
    }
}

/// A value comparison that never became true before its timeout.
#[derive(Debug, Clone)]
pub struct Mismatch {
    /// Directive name as written in the scenario (`equals`, `likes`, ...)
    pub directive: &'static str,

    /// Human-readable target (`By(css selector, h3)`, `html`, `url`)
    pub target: String,

    /// Extraction label (`inner text`, `select value`, `href attribute`, ...)
    pub kind: String,

    pub expected: Vec<String>,

    /// Values observed on the last attempt
    pub actual: Vec<String>,
}

impl Mismatch {
    fn verb(&self) -> &'static str {
        match self.directive {
            "equals" => "is not",
            "notEquals" => "should not be",
            "likes" => "does not like",
            "notLikes" => "should not like",
            "checked" => "does not have checked",
            "unchecked" => "should not have checked",
            "selected" => "does not have selected",
            "unselected" => "should not have selected",
            _ => "does not satisfy",
        }
    }
}

impl std::error::Error for Mismatch {}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} of {} {} `{}` actual `{}`",
            self.directive,
            self.kind,
            self.target,
            self.verb(),
            self.expected.join(", "),
            self.actual.join(", ")
        )
    }
}

/// A failure decorated with the page context it happened in.
#[derive(Debug)]
pub struct StepFailure {
    pub url: String,

    /// JSON rendering of the failing step, without its nested scenario
    pub step_json: String,

    /// Outer HTML of the document at the time of failure
    pub html: String,

    pub source: CheckError,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\nJSON: {}\nMessage: {}\n{}",
            self.url, self.step_json, self.source, self.html
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mismatch(directive: &'static str) -> Mismatch {
        Mismatch {
            directive,
            target: "By(css selector, .nav)".to_string(),
            kind: "class attribute".to_string(),
            expected: vec!["nav".to_string()],
            actual: vec!["nav nav-pills".to_string()],
        }
    }

    #[test]
    fn test_mismatch_message() {
        let err = CheckError::from(mismatch("equals"));
        assert_eq!(err.name(), "NotMatchError");
        assert_eq!(
            err.to_string(),
            "equals: class attribute of By(css selector, .nav) is not `nav` actual `nav nav-pills`"
        );
    }

    #[test]
    fn test_reported_keeps_source_name() {
        let err = CheckError::Reported(Box::new(StepFailure {
            url: "http://127.0.0.1:8080/".to_string(),
            step_json: "{}".to_string(),
            html: "<html></html>".to_string(),
            source: CheckError::Javascript("Uncaught ReferenceError".to_string()),
        }));
        assert_eq!(err.name(), "JavascriptError");
        assert!(matches!(err.root(), CheckError::Javascript(_)));

        let message = err.to_string();
        assert!(message.starts_with("http://127.0.0.1:8080/\nJSON: {}\nMessage: "));
        assert!(message.ends_with("<html></html>"));
    }

    #[test]
    fn test_configuration_errors() {
        assert!(CheckError::invalid("bad").is_configuration());
        assert!(CheckError::MissingPlaceholder("url".into()).is_configuration());
        assert!(!CheckError::Javascript("x".into()).is_configuration());
    }
}
