//! Element locators
//!
//! Locators are opaque to the interpreter: they are parsed from the scenario,
//! printed in failure messages and handed to the driver untouched.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A strategy plus selector, written in scenarios as `{css: ".nav"}`,
/// `{xpath: "//h3"}` and so on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    Xpath(String),
    Id(String),
    Name(String),
    ClassName(String),
    LinkText(String),
    TagName(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Locator::Xpath(expression.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }

    /// Key the locator is written with in scenarios
    pub fn key(&self) -> &'static str {
        match self {
            Locator::Css(_) => "css",
            Locator::Xpath(_) => "xpath",
            Locator::Id(_) => "id",
            Locator::Name(_) => "name",
            Locator::ClassName(_) => "className",
            Locator::LinkText(_) => "linkText",
            Locator::TagName(_) => "tagName",
        }
    }

    /// WebDriver strategy name
    pub fn strategy(&self) -> &'static str {
        match self {
            Locator::Css(_) => "css selector",
            Locator::Xpath(_) => "xpath",
            Locator::Id(_) => "id",
            Locator::Name(_) => "name",
            Locator::ClassName(_) => "class name",
            Locator::LinkText(_) => "link text",
            Locator::TagName(_) => "tag name",
        }
    }

    pub fn selector(&self) -> &str {
        match self {
            Locator::Css(s)
            | Locator::Xpath(s)
            | Locator::Id(s)
            | Locator::Name(s)
            | Locator::ClassName(s)
            | Locator::LinkText(s)
            | Locator::TagName(s) => s,
        }
    }
}

impl Serialize for Locator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.key(), self.selector())?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Locator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, String>::deserialize(deserializer)?;
        let mut entries = map.into_iter();
        let (key, selector) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err(D::Error::custom("a locator is a map with exactly one strategy key")),
        };

        Ok(match key.as_str() {
            "css" => Locator::Css(selector),
            "xpath" => Locator::Xpath(selector),
            "id" => Locator::Id(selector),
            "name" => Locator::Name(selector),
            "className" => Locator::ClassName(selector),
            "linkText" => Locator::LinkText(selector),
            "tagName" => Locator::TagName(selector),
            other => return Err(D::Error::custom(format!("unknown locator strategy `{}`", other))),
        })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "By({}, {})", self.strategy(), self.selector())
    }
}
