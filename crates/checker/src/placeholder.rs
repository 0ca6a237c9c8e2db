//! Deferred scenario values
//!
//! A [`Placeholder`] names a key in a [`Placeholders`] mapping plus an ordered
//! list of appended literals or further placeholders. Scenario fields that may
//! be deferred are typed [`Deferred<T>`]; [`Resolve`] turns a tree containing
//! placeholders into a fresh tree containing only values, leaving the input
//! untouched.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CheckError, Result};
use crate::locator::Locator;

/// Reference to a mapping entry, written as
/// `{placeholder: url, append: ["/form.html"]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Placeholder {
    #[serde(rename = "placeholder")]
    pub key: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub append: Vec<Segment>,
}

/// Shorthand for [`Placeholder::new`].
pub fn placeholder(key: impl Into<String>) -> Placeholder {
    Placeholder::new(key)
}

impl Placeholder {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            append: Vec::new(),
        }
    }

    pub fn append(mut self, segment: impl Into<Segment>) -> Self {
        self.append.push(segment.into());
        self
    }

    /// Look up the key and concatenate the appended segments.
    ///
    /// Without appended segments the mapped value is returned as is, so a
    /// locator stays a locator. With segments the result is always text.
    pub fn resolve(&self, placeholders: &Placeholders) -> Result<PlaceholderValue> {
        let base = placeholders
            .get(&self.key)
            .ok_or_else(|| CheckError::MissingPlaceholder(self.key.clone()))?;

        if self.append.is_empty() {
            return Ok(base.clone());
        }

        let mut text = base.to_text();
        for segment in &self.append {
            match segment {
                Segment::Literal(literal) => text.push_str(literal),
                Segment::Placeholder(inner) => text.push_str(&inner.resolve(placeholders)?.to_text()),
            }
        }
        Ok(PlaceholderValue::Text(text))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    Placeholder(Placeholder),
    Literal(String),
}

impl From<&str> for Segment {
    fn from(literal: &str) -> Self {
        Segment::Literal(literal.to_string())
    }
}

impl From<String> for Segment {
    fn from(literal: String) -> Self {
        Segment::Literal(literal)
    }
}

impl From<Placeholder> for Segment {
    fn from(placeholder: Placeholder) -> Self {
        Segment::Placeholder(placeholder)
    }
}

/// A value a placeholder key can map to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlaceholderValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    Locator(Locator),
}

impl PlaceholderValue {
    /// String form used when the value is concatenated.
    pub fn to_text(&self) -> String {
        match self {
            PlaceholderValue::Bool(b) => b.to_string(),
            PlaceholderValue::Number(n) => n.to_string(),
            PlaceholderValue::Text(s) => s.clone(),
            PlaceholderValue::Locator(l) => l.to_string(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            PlaceholderValue::Bool(_) => "a boolean",
            PlaceholderValue::Number(_) => "a number",
            PlaceholderValue::Text(_) => "text",
            PlaceholderValue::Locator(_) => "a locator",
        }
    }
}

impl From<&str> for PlaceholderValue {
    fn from(text: &str) -> Self {
        PlaceholderValue::Text(text.to_string())
    }
}

impl From<String> for PlaceholderValue {
    fn from(text: String) -> Self {
        PlaceholderValue::Text(text)
    }
}

impl From<Locator> for PlaceholderValue {
    fn from(locator: Locator) -> Self {
        PlaceholderValue::Locator(locator)
    }
}

impl From<bool> for PlaceholderValue {
    fn from(b: bool) -> Self {
        PlaceholderValue::Bool(b)
    }
}

/// Name → value mapping placeholders are resolved against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Placeholders(HashMap<String, PlaceholderValue>);

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PlaceholderValue>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<PlaceholderValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&PlaceholderValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Load a mapping from a YAML or JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            _ => Ok(serde_yaml::from_str(&content)?),
        }
    }
}

impl<K: Into<String>, V: Into<PlaceholderValue>> FromIterator<(K, V)> for Placeholders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Types a placeholder can stand in for.
pub trait FromPlaceholder: Sized {
    fn from_placeholder(key: &str, value: PlaceholderValue) -> Result<Self>;
}

impl FromPlaceholder for String {
    fn from_placeholder(_key: &str, value: PlaceholderValue) -> Result<Self> {
        Ok(value.to_text())
    }
}

impl FromPlaceholder for Locator {
    fn from_placeholder(key: &str, value: PlaceholderValue) -> Result<Self> {
        match value {
            PlaceholderValue::Locator(locator) => Ok(locator),
            other => Err(CheckError::invalid(format!(
                "placeholder `{}` must map to a locator, found {}",
                key,
                other.describe()
            ))),
        }
    }
}

impl FromPlaceholder for bool {
    fn from_placeholder(key: &str, value: PlaceholderValue) -> Result<Self> {
        match value {
            PlaceholderValue::Bool(b) => Ok(b),
            other => Err(CheckError::invalid(format!(
                "placeholder `{}` must map to a boolean, found {}",
                key,
                other.describe()
            ))),
        }
    }
}

/// A scenario field that is either a literal value or a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Deferred<T> {
    Placeholder(Placeholder),
    Value(T),
}

impl<T> Deferred<T> {
    /// The literal value. Placeholders must have been resolved first.
    pub fn get(&self) -> Result<&T> {
        match self {
            Deferred::Value(value) => Ok(value),
            Deferred::Placeholder(p) => Err(CheckError::invalid(format!(
                "placeholder `{}` was used before being resolved",
                p.key
            ))),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Deferred::Placeholder(_))
    }
}

impl<T> From<Placeholder> for Deferred<T> {
    fn from(placeholder: Placeholder) -> Self {
        Deferred::Placeholder(placeholder)
    }
}

impl From<Locator> for Deferred<Locator> {
    fn from(locator: Locator) -> Self {
        Deferred::Value(locator)
    }
}

impl From<&str> for Deferred<String> {
    fn from(text: &str) -> Self {
        Deferred::Value(text.to_string())
    }
}

impl From<bool> for Deferred<bool> {
    fn from(b: bool) -> Self {
        Deferred::Value(b)
    }
}

/// Produce a copy of `self` with every placeholder replaced by its value.
pub trait Resolve: Sized {
    fn resolve(&self, placeholders: &Placeholders) -> Result<Self>;
}

impl<T: FromPlaceholder + Clone> Resolve for Deferred<T> {
    fn resolve(&self, placeholders: &Placeholders) -> Result<Self> {
        match self {
            Deferred::Value(value) => Ok(Deferred::Value(value.clone())),
            Deferred::Placeholder(p) => {
                let value = p.resolve(placeholders)?;
                Ok(Deferred::Value(T::from_placeholder(&p.key, value)?))
            }
        }
    }
}

impl<T: Resolve> Resolve for Option<T> {
    fn resolve(&self, placeholders: &Placeholders) -> Result<Self> {
        self.as_ref().map(|inner| inner.resolve(placeholders)).transpose()
    }
}

impl<T: Resolve> Resolve for Vec<T> {
    fn resolve(&self, placeholders: &Placeholders) -> Result<Self> {
        self.iter().map(|item| item.resolve(placeholders)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> Placeholders {
        Placeholders::new()
            .with("name", "X")
            .with("url", "http://127.0.0.1:8080")
            .with("header", Locator::css("header"))
    }

    #[test]
    fn test_append_literal() {
        let p = placeholder("name").append("-suffix");
        assert_eq!(p.resolve(&mapping()).unwrap(), PlaceholderValue::Text("X-suffix".into()));
    }

    #[test]
    fn test_append_nested_placeholder() {
        let p = placeholder("url").append("/").append(placeholder("name").append(".html"));
        assert_eq!(
            p.resolve(&mapping()).unwrap().to_text(),
            "http://127.0.0.1:8080/X.html"
        );
    }

    #[test]
    fn test_missing_key() {
        let err = placeholder("nope").resolve(&mapping()).unwrap_err();
        assert!(matches!(err, CheckError::MissingPlaceholder(ref key) if key == "nope"));
        assert_eq!(err.name(), "MissingPlaceholderError");

        let nested = placeholder("name").append(placeholder("also-nope"));
        assert!(matches!(
            nested.resolve(&mapping()),
            Err(CheckError::MissingPlaceholder(_))
        ));
    }

    #[test]
    fn test_sole_locator_is_preserved() {
        let deferred: Deferred<Locator> = placeholder("header").into();
        let resolved = deferred.resolve(&mapping()).unwrap();
        assert_eq!(resolved, Deferred::Value(Locator::css("header")));
    }

    #[test]
    fn test_locator_stringifies_when_appended() {
        let deferred: Deferred<String> = placeholder("header").append("!").into();
        let resolved = deferred.resolve(&mapping()).unwrap();
        assert_eq!(resolved.get().unwrap(), "By(css selector, header)!");
    }

    #[test]
    fn test_text_in_locator_slot_is_rejected() {
        let deferred: Deferred<Locator> = placeholder("name").into();
        let err = deferred.resolve(&mapping()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_resolution_leaves_input_untouched() {
        let deferred: Deferred<String> = placeholder("name").append("-suffix").into();
        let before = deferred.clone();

        let first = deferred.resolve(&mapping()).unwrap();
        let second = deferred.resolve(&mapping()).unwrap();

        assert_eq!(first, second);
        assert_eq!(deferred, before);
        assert!(deferred.is_placeholder());
        assert!(deferred.get().is_err());
    }

    #[test]
    fn test_parse_mapping_yaml() {
        let yaml = r#"
url: http://127.0.0.1:8080
retries: 3
enabled: true
button:
  css: .submit
"#;
        let placeholders: Placeholders = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(placeholders.len(), 4);
        assert_eq!(placeholders.get("retries").unwrap().to_text(), "3");
        assert_eq!(placeholders.get("enabled"), Some(&PlaceholderValue::Bool(true)));
        assert_eq!(
            placeholders.get("button"),
            Some(&PlaceholderValue::Locator(Locator::css(".submit")))
        );
    }

    #[test]
    fn test_parse_deferred() {
        let value: Deferred<String> =
            serde_yaml::from_str("{placeholder: url, append: [/form.html]}").unwrap();
        assert_eq!(value, Deferred::Placeholder(placeholder("url").append("/form.html")));

        let value: Deferred<String> = serde_yaml::from_str("plain").unwrap();
        assert_eq!(value, Deferred::Value("plain".to_string()));
    }
}
