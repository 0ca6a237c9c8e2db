//! Comparison policies behind the value assertions

use crate::error::{CheckError, Result};

/// Order-independent equality, duplicates included.
pub fn equals(actual: &[String], expected: &[String]) -> bool {
    if actual.len() != expected.len() {
        return false;
    }
    let mut actual: Vec<&str> = actual.iter().map(String::as_str).collect();
    let mut expected: Vec<&str> = expected.iter().map(String::as_str).collect();
    actual.sort_unstable();
    expected.sort_unstable();
    actual == expected
}

/// Substring containment of `expected` in the single actual value.
///
/// More than one actual value is a configuration error: the target must be
/// narrowed to one element.
pub fn likes(actual: &[String], expected: &str) -> Result<bool> {
    match actual {
        [] => Ok(false),
        [value] => Ok(value.contains(expected)),
        many => Err(CheckError::invalid(format!(
            "Multiple values were detected `{}`; `likes` needs exactly one",
            many.join(", ")
        ))),
    }
}

/// Every expected value is present.
pub fn contains_all(actual: &[String], expected: &[String]) -> bool {
    expected.iter().all(|e| actual.contains(e))
}

/// No expected value is present.
pub fn contains_none(actual: &[String], expected: &[String]) -> bool {
    !expected.iter().any(|e| actual.contains(e))
}
