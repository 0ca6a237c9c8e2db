//! Declarative scenario model
//!
//! A scenario is an ordered list of [`Step`]s. Each step may navigate, guard
//! the rest of its list with `execif`, perform [`Action`]s, verify
//! [`Assertion`]s and descend into a nested scenario.
//!
//! Actions and assertions are written as a map with exactly one directive key
//! plus modifier keys:
//!
//! ```yaml
//! - url: http://127.0.0.1:8080/form.html
//! - actions:
//!     - sendKeys: {css: .input}
//!       value: fooBarTest
//!     - click: {css: .submit}
//! - checks:
//!     - exists: {css: .result}
//!       timeout: 8000
//!     - equals: {css: .nav}
//!       type: {attr: class}
//!       value: nav nav-pills
//!     - likes: html
//!       value: "<title>Home</title>"
//! ```
//!
//! Directive maps are normalized into closed enums at parse time, so malformed
//! combinations (both `value` and `values`, `likes` with `values`, unknown
//! directive names) are rejected before anything runs. They fail as
//! configuration errors; malformed YAML or JSON fails as a parse error.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{CheckError, Result};
use crate::locator::Locator;
use crate::placeholder::{Deferred, Placeholders, Resolve};

/// An ordered sequence of steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scenario(pub Vec<Step>);

impl Scenario {
    pub fn new(steps: Vec<Step>) -> Self {
        Self(steps)
    }

    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::normalize(serde_yaml::from_str(yaml)?)
    }

    /// Parse a scenario from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Self::normalize(serde_json::from_str(json)?)
    }

    fn normalize(raw: Vec<RawStep>) -> Result<Self> {
        raw.into_iter()
            .map(Step::try_from)
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    /// Parse a scenario file, choosing the format by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Load every scenario file under a directory, sorted by path
    pub fn load_all(dir: &Path) -> Result<Vec<(PathBuf, Self)>> {
        find_files(dir)
            .into_iter()
            .map(|path| Self::from_file(&path).map(|scenario| (path, scenario)))
            .collect()
    }
}

/// Scenario files under `dir`, recursively, sorted by path
pub fn find_files(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_scenario_file(e.path()))
        .map(|e| e.into_path())
        .collect()
}

/// True for `.yaml`, `.yml` and `.json` files
pub fn is_scenario_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext, "yaml" | "yml" | "json"))
        .unwrap_or(false)
}

impl Deref for Scenario {
    type Target = [Step];

    fn deref(&self) -> &[Step] {
        &self.0
    }
}

impl From<Vec<Step>> for Scenario {
    fn from(steps: Vec<Step>) -> Self {
        Self(steps)
    }
}

impl Resolve for Scenario {
    fn resolve(&self, placeholders: &Placeholders) -> Result<Self> {
        Ok(Self(self.0.resolve(placeholders)?))
    }
}

/// One node of a scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStep")]
pub struct Step {
    /// Navigate to this URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<Deferred<String>>,

    /// Navigate by clicking this element
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Deferred<Locator>>,

    /// Guard for the rest of the enclosing list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execif: Option<Guard>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<Assertion>,

    /// Nested, independently run sub-scenario
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<Scenario>,
}

impl Step {
    pub fn visit(url: impl Into<Deferred<String>>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn guard(guard: Guard) -> Self {
        Self {
            execif: Some(guard),
            ..Default::default()
        }
    }

    pub fn actions(actions: Vec<Action>) -> Self {
        Self {
            actions,
            ..Default::default()
        }
    }

    pub fn checks(checks: Vec<Assertion>) -> Self {
        Self {
            checks,
            ..Default::default()
        }
    }

    pub fn nested(steps: Vec<Step>) -> Self {
        Self {
            scenario: Some(Scenario(steps)),
            ..Default::default()
        }
    }

    /// Copy of the step without its nested scenario
    pub fn shallow(&self) -> Self {
        Self {
            scenario: None,
            ..self.clone()
        }
    }
}

/// A step as written, with directive maps not yet normalized.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    #[serde(default)]
    url: Option<Deferred<String>>,
    #[serde(default)]
    link: Option<Deferred<Locator>>,
    #[serde(default)]
    execif: Option<Vec<Vec<Map<String, Value>>>>,
    #[serde(default)]
    actions: Vec<Map<String, Value>>,
    #[serde(default)]
    checks: Vec<Map<String, Value>>,
    #[serde(default)]
    scenario: Option<Vec<RawStep>>,
}

impl TryFrom<RawStep> for Step {
    type Error = CheckError;

    fn try_from(raw: RawStep) -> Result<Self> {
        let execif = raw
            .execif
            .map(|groups| {
                groups
                    .into_iter()
                    .map(|group| group.into_iter().map(Predicate::try_from).collect::<Result<Vec<_>>>())
                    .collect::<Result<Vec<_>>>()
                    .map(Guard)
            })
            .transpose()?;

        Ok(Self {
            url: raw.url,
            link: raw.link,
            execif,
            actions: raw.actions.into_iter().map(Action::try_from).collect::<Result<_>>()?,
            checks: raw.checks.into_iter().map(Assertion::try_from).collect::<Result<_>>()?,
            scenario: raw.scenario.map(Scenario::normalize).transpose()?,
        })
    }
}

impl Resolve for Step {
    fn resolve(&self, placeholders: &Placeholders) -> Result<Self> {
        Ok(Self {
            url: self.url.resolve(placeholders)?,
            link: self.link.resolve(placeholders)?,
            execif: self.execif.resolve(placeholders)?,
            actions: self.actions.resolve(placeholders)?,
            checks: self.checks.resolve(placeholders)?,
            scenario: self.scenario.resolve(placeholders)?,
        })
    }
}

/// `execif`: a list of OR-groups that must all hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guard(pub Vec<Vec<Predicate>>);

impl Resolve for Guard {
    fn resolve(&self, placeholders: &Placeholders) -> Result<Self> {
        Ok(Self(self.0.resolve(placeholders)?))
    }
}

/// One predicate inside an `execif` group.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub enum Predicate {
    /// `{bool: true}`
    Bool(Deferred<bool>),
    Assert(Assertion),
}

impl TryFrom<Map<String, Value>> for Predicate {
    type Error = CheckError;

    fn try_from(mut map: Map<String, Value>) -> Result<Self> {
        match map.remove("bool") {
            Some(value) => {
                if let Some(extra) = map.keys().next() {
                    return Err(CheckError::invalid(format!(
                        "`{}` is not supported by `bool`",
                        extra
                    )));
                }
                Ok(Predicate::Bool(parse_field("bool", value)?))
            }
            None => Ok(Predicate::Assert(Assertion::try_from(map)?)),
        }
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Predicate::Bool(b) => {
                let mut map = Map::new();
                map.insert("bool".to_string(), to_json(b));
                map.serialize(serializer)
            }
            Predicate::Assert(assertion) => assertion.serialize(serializer),
        }
    }
}

impl Resolve for Predicate {
    fn resolve(&self, placeholders: &Placeholders) -> Result<Self> {
        Ok(match self {
            Predicate::Bool(b) => Predicate::Bool(b.resolve(placeholders)?),
            Predicate::Assert(a) => Predicate::Assert(a.resolve(placeholders)?),
        })
    }
}

/// What `clear` does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearMode {
    /// Empty a text input
    Text,
    /// Uncheck every checked box in the matched group
    Checkbox,
}

/// How to answer a native dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertAnswer {
    Accept,
    Dismiss,
}

/// Where `switchTo` moves the browsing context.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameTarget {
    /// The top-level document, written as `default`
    Default,
    Frame(Deferred<Locator>),
}

/// A browser mutation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub enum Action {
    Click {
        target: Deferred<Locator>,
        timeout: Option<Duration>,
    },
    SendKeys {
        target: Deferred<Locator>,
        value: Deferred<String>,
        timeout: Option<Duration>,
    },
    Clear {
        target: Deferred<Locator>,
        mode: ClearMode,
        timeout: Option<Duration>,
    },
    Check {
        target: Deferred<Locator>,
        values: Vec<Deferred<String>>,
        timeout: Option<Duration>,
    },
    Select {
        target: Deferred<Locator>,
        values: Vec<Deferred<String>>,
        timeout: Option<Duration>,
    },
    Unselect {
        target: Deferred<Locator>,
        values: Vec<Deferred<String>>,
        timeout: Option<Duration>,
    },
    Alert {
        answer: AlertAnswer,
        timeout: Option<Duration>,
    },
    SwitchTo {
        frame: FrameTarget,
        timeout: Option<Duration>,
    },
}

const ACTION_DIRECTIVES: &[&str] = &[
    "click", "sendKeys", "clear", "check", "select", "unselect", "alert", "switchTo",
];
const ACTION_MODIFIERS: &[&str] = &["value", "values", "type", "timeout", "count"];

impl Action {
    pub fn click(target: impl Into<Deferred<Locator>>) -> Self {
        Action::Click {
            target: target.into(),
            timeout: None,
        }
    }

    pub fn send_keys(target: impl Into<Deferred<Locator>>, value: impl Into<Deferred<String>>) -> Self {
        Action::SendKeys {
            target: target.into(),
            value: value.into(),
            timeout: None,
        }
    }

    /// Directive name as written in scenarios
    pub fn directive(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click",
            Action::SendKeys { .. } => "sendKeys",
            Action::Clear { .. } => "clear",
            Action::Check { .. } => "check",
            Action::Select { .. } => "select",
            Action::Unselect { .. } => "unselect",
            Action::Alert { .. } => "alert",
            Action::SwitchTo { .. } => "switchTo",
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Action::Click { timeout, .. }
            | Action::SendKeys { timeout, .. }
            | Action::Clear { timeout, .. }
            | Action::Check { timeout, .. }
            | Action::Select { timeout, .. }
            | Action::Unselect { timeout, .. }
            | Action::Alert { timeout, .. }
            | Action::SwitchTo { timeout, .. } => *timeout,
        }
    }

    fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        let body = match self {
            Action::Click { target, .. } => to_json(target),
            Action::SendKeys { target, value, .. } => {
                map.insert("value".to_string(), to_json(value));
                to_json(target)
            }
            Action::Clear { target, mode, .. } => {
                if *mode == ClearMode::Checkbox {
                    map.insert("type".to_string(), Value::from("checkbox"));
                }
                to_json(target)
            }
            Action::Check { target, values, .. }
            | Action::Select { target, values, .. }
            | Action::Unselect { target, values, .. } => {
                map.insert("values".to_string(), to_json(values));
                to_json(target)
            }
            Action::Alert { answer, .. } => to_json(answer),
            Action::SwitchTo { frame, .. } => match frame {
                FrameTarget::Default => Value::from("default"),
                FrameTarget::Frame(locator) => to_json(locator),
            },
        };
        map.insert(self.directive().to_string(), body);
        if let Some(timeout) = self.timeout() {
            map.insert("timeout".to_string(), Value::from(timeout.as_millis() as u64));
        }
        map
    }
}

impl TryFrom<Map<String, Value>> for Action {
    type Error = CheckError;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        let mut fields = DirectiveFields::split(map, "action", ACTION_DIRECTIVES, ACTION_MODIFIERS)?;
        let timeout = fields.timeout()?;
        let name = fields.name.clone();

        let action = match name.as_str() {
            "click" => Action::Click {
                target: fields.body()?,
                timeout,
            },
            "sendKeys" => Action::SendKeys {
                target: fields.body()?,
                value: fields
                    .take("value")?
                    .ok_or_else(|| CheckError::invalid("`sendKeys` requires a `value`"))?,
                timeout,
            },
            "clear" => {
                let mode = match fields.take::<String>("type")?.as_deref() {
                    None => ClearMode::Text,
                    Some("checkbox") => ClearMode::Checkbox,
                    Some(other) => {
                        return Err(CheckError::invalid(format!(
                            "`clear` does not support type `{}`",
                            other
                        )))
                    }
                };
                Action::Clear {
                    target: fields.body()?,
                    mode,
                    timeout,
                }
            }
            "check" | "select" | "unselect" => {
                let target = fields.body()?;
                let values = fields.expected_list()?;
                match name.as_str() {
                    "check" => Action::Check { target, values, timeout },
                    "select" => Action::Select { target, values, timeout },
                    _ => Action::Unselect { target, values, timeout },
                }
            }
            "alert" => Action::Alert {
                answer: fields.body()?,
                timeout,
            },
            "switchTo" => {
                let frame = match fields.body.as_str() {
                    Some("default") => FrameTarget::Default,
                    Some(other) => {
                        return Err(CheckError::invalid(format!(
                            "`switchTo` expects a locator or `default`, found `{}`",
                            other
                        )))
                    }
                    None => FrameTarget::Frame(fields.body()?),
                };
                Action::SwitchTo { frame, timeout }
            }
            _ => unreachable!("directive names are validated by DirectiveFields::split"),
        };

        fields.finish()?;
        Ok(action)
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl Resolve for Action {
    fn resolve(&self, p: &Placeholders) -> Result<Self> {
        Ok(match self {
            Action::Click { target, timeout } => Action::Click {
                target: target.resolve(p)?,
                timeout: *timeout,
            },
            Action::SendKeys { target, value, timeout } => Action::SendKeys {
                target: target.resolve(p)?,
                value: value.resolve(p)?,
                timeout: *timeout,
            },
            Action::Clear { target, mode, timeout } => Action::Clear {
                target: target.resolve(p)?,
                mode: *mode,
                timeout: *timeout,
            },
            Action::Check { target, values, timeout } => Action::Check {
                target: target.resolve(p)?,
                values: values.resolve(p)?,
                timeout: *timeout,
            },
            Action::Select { target, values, timeout } => Action::Select {
                target: target.resolve(p)?,
                values: values.resolve(p)?,
                timeout: *timeout,
            },
            Action::Unselect { target, values, timeout } => Action::Unselect {
                target: target.resolve(p)?,
                values: values.resolve(p)?,
                timeout: *timeout,
            },
            Action::Alert { answer, timeout } => Action::Alert {
                answer: *answer,
                timeout: *timeout,
            },
            Action::SwitchTo { frame, timeout } => Action::SwitchTo {
                frame: match frame {
                    FrameTarget::Default => FrameTarget::Default,
                    FrameTarget::Frame(locator) => FrameTarget::Frame(locator.resolve(p)?),
                },
                timeout: *timeout,
            },
        })
    }
}

/// What an assertion reads values from.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Element(Deferred<Locator>),
    /// Whole-document outer HTML
    Html,
    /// Current URL
    Url,
}

impl Target {
    fn parse(value: Value) -> Result<Self> {
        match value {
            Value::String(s) if s == "html" => Ok(Target::Html),
            Value::String(s) if s == "url" => Ok(Target::Url),
            Value::String(s) => Err(CheckError::invalid(format!(
                "unknown pseudo-locator `{}`; expected `html`, `url` or a locator",
                s
            ))),
            other => Ok(Target::Element(parse_field("locator", other)?)),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Target::Element(locator) => to_json(locator),
            Target::Html => Value::from("html"),
            Target::Url => Value::from("url"),
        }
    }

    /// Human-readable form used in failure messages
    pub fn describe(&self) -> String {
        match self {
            Target::Element(Deferred::Value(locator)) => locator.to_string(),
            Target::Element(Deferred::Placeholder(p)) => format!("placeholder `{}`", p.key),
            Target::Html => "html".to_string(),
            Target::Url => "url".to_string(),
        }
    }
}

impl Resolve for Target {
    fn resolve(&self, placeholders: &Placeholders) -> Result<Self> {
        Ok(match self {
            Target::Element(locator) => Target::Element(locator.resolve(placeholders)?),
            Target::Html => Target::Html,
            Target::Url => Target::Url,
        })
    }
}

/// Extraction override declared with `type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Checkbox,
    Radio,
    Select,
    /// Read this attribute instead of the default extraction
    Attr(String),
}

impl ValueKind {
    fn parse(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => match s.as_str() {
                "checkbox" => Ok(ValueKind::Checkbox),
                "radio" => Ok(ValueKind::Radio),
                "select" => Ok(ValueKind::Select),
                other => Err(CheckError::invalid(format!("unknown type `{}`", other))),
            },
            Value::Object(mut map) => match (map.remove("attr"), map.is_empty()) {
                (Some(Value::String(attr)), true) => Ok(ValueKind::Attr(attr)),
                _ => Err(CheckError::invalid("`type` object must be exactly `{attr: <name>}`")),
            },
            other => Err(CheckError::invalid(format!("invalid type `{}`", other))),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            ValueKind::Checkbox => Value::from("checkbox"),
            ValueKind::Radio => Value::from("radio"),
            ValueKind::Select => Value::from("select"),
            ValueKind::Attr(attr) => {
                let mut map = Map::new();
                map.insert("attr".to_string(), Value::from(attr.as_str()));
                Value::Object(map)
            }
        }
    }
}

/// Expected value(s) of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    /// `value`
    One(Deferred<String>),
    /// `values`, order-irrelevant
    Many(Vec<Deferred<String>>),
}

impl Expected {
    /// The expected strings. Placeholders must have been resolved.
    pub fn values(&self) -> Result<Vec<String>> {
        match self {
            Expected::One(value) => Ok(vec![value.get()?.clone()]),
            Expected::Many(values) => values.iter().map(|v| v.get().cloned()).collect(),
        }
    }
}

impl Resolve for Expected {
    fn resolve(&self, placeholders: &Placeholders) -> Result<Self> {
        Ok(match self {
            Expected::One(value) => Expected::One(value.resolve(placeholders)?),
            Expected::Many(values) => Expected::Many(values.resolve(placeholders)?),
        })
    }
}

/// Name of a registered predicate for `satisfies`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredicateName(pub String);

impl Resolve for PredicateName {
    fn resolve(&self, _placeholders: &Placeholders) -> Result<Self> {
        Ok(self.clone())
    }
}

/// `exists` / `notExists` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Presence {
    pub target: Deferred<Locator>,
    /// Exact number of matched elements required
    pub count: Option<usize>,
    pub timeout: Option<Duration>,
}

impl Resolve for Presence {
    fn resolve(&self, placeholders: &Placeholders) -> Result<Self> {
        Ok(Self {
            target: self.target.resolve(placeholders)?,
            count: self.count,
            timeout: self.timeout,
        })
    }
}

/// Payload of every value-comparing assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Compare<E> {
    pub target: Target,
    pub expected: E,
    pub extract: Option<ValueKind>,
    pub count: Option<usize>,
    pub timeout: Option<Duration>,
}

impl<E: Resolve> Resolve for Compare<E> {
    fn resolve(&self, placeholders: &Placeholders) -> Result<Self> {
        Ok(Self {
            target: self.target.resolve(placeholders)?,
            expected: self.expected.resolve(placeholders)?,
            extract: self.extract.clone(),
            count: self.count,
            timeout: self.timeout,
        })
    }
}

/// A verification, one variant per directive.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub enum Assertion {
    Exists(Presence),
    NotExists(Presence),
    Equals(Compare<Expected>),
    NotEquals(Compare<Expected>),
    Likes(Compare<Deferred<String>>),
    NotLikes(Compare<Deferred<String>>),
    Checked(Compare<Expected>),
    Unchecked(Compare<Expected>),
    Selected(Compare<Expected>),
    Unselected(Compare<Expected>),
    /// Registered predicate over the extracted values
    Satisfies(Compare<PredicateName>),
}

const ASSERTION_DIRECTIVES: &[&str] = &[
    "exists", "notExists", "equals", "notEquals", "likes", "notLikes", "checked", "unchecked",
    "selected", "unselected", "satisfies",
];
const ASSERTION_MODIFIERS: &[&str] = &["value", "values", "type", "timeout", "count", "predicate"];

/// Prefix of the `attr_<name>: value` shorthand
const ATTR_PREFIX: &str = "attr_";

impl Assertion {
    pub fn exists(target: impl Into<Deferred<Locator>>) -> Self {
        Assertion::Exists(Presence {
            target: target.into(),
            count: None,
            timeout: None,
        })
    }

    pub fn not_exists(target: impl Into<Deferred<Locator>>) -> Self {
        Assertion::NotExists(Presence {
            target: target.into(),
            count: None,
            timeout: None,
        })
    }

    /// Directive name as written in scenarios
    pub fn directive(&self) -> &'static str {
        match self {
            Assertion::Exists(_) => "exists",
            Assertion::NotExists(_) => "notExists",
            Assertion::Equals(_) => "equals",
            Assertion::NotEquals(_) => "notEquals",
            Assertion::Likes(_) => "likes",
            Assertion::NotLikes(_) => "notLikes",
            Assertion::Checked(_) => "checked",
            Assertion::Unchecked(_) => "unchecked",
            Assertion::Selected(_) => "selected",
            Assertion::Unselected(_) => "unselected",
            Assertion::Satisfies(_) => "satisfies",
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Assertion::Exists(p) | Assertion::NotExists(p) => p.timeout,
            Assertion::Equals(c)
            | Assertion::NotEquals(c)
            | Assertion::Checked(c)
            | Assertion::Unchecked(c)
            | Assertion::Selected(c)
            | Assertion::Unselected(c) => c.timeout,
            Assertion::Likes(c) | Assertion::NotLikes(c) => c.timeout,
            Assertion::Satisfies(c) => c.timeout,
        }
    }

    fn to_map(&self) -> Map<String, Value> {
        fn compare_fields<E>(map: &mut Map<String, Value>, c: &Compare<E>) -> Value {
            if let Some(kind) = &c.extract {
                map.insert("type".to_string(), kind.to_json());
            }
            if let Some(count) = c.count {
                map.insert("count".to_string(), Value::from(count));
            }
            c.target.to_json()
        }

        fn expected_fields(map: &mut Map<String, Value>, expected: &Expected) {
            match expected {
                Expected::One(value) => map.insert("value".to_string(), to_json(value)),
                Expected::Many(values) => map.insert("values".to_string(), to_json(values)),
            };
        }

        let mut map = Map::new();
        let body = match self {
            Assertion::Exists(p) | Assertion::NotExists(p) => {
                if let Some(count) = p.count {
                    map.insert("count".to_string(), Value::from(count));
                }
                to_json(&p.target)
            }
            Assertion::Equals(c)
            | Assertion::NotEquals(c)
            | Assertion::Checked(c)
            | Assertion::Unchecked(c)
            | Assertion::Selected(c)
            | Assertion::Unselected(c) => {
                expected_fields(&mut map, &c.expected);
                compare_fields(&mut map, c)
            }
            Assertion::Likes(c) | Assertion::NotLikes(c) => {
                map.insert("value".to_string(), to_json(&c.expected));
                compare_fields(&mut map, c)
            }
            Assertion::Satisfies(c) => {
                map.insert("predicate".to_string(), Value::from(c.expected.0.as_str()));
                compare_fields(&mut map, c)
            }
        };
        map.insert(self.directive().to_string(), body);
        if let Some(timeout) = self.timeout() {
            map.insert("timeout".to_string(), Value::from(timeout.as_millis() as u64));
        }
        map
    }
}

impl TryFrom<Map<String, Value>> for Assertion {
    type Error = CheckError;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        let mut fields =
            DirectiveFields::split(map, "assertion", ASSERTION_DIRECTIVES, ASSERTION_MODIFIERS)?;
        let timeout = fields.timeout()?;
        let count = fields.take::<usize>("count")?;
        let name = fields.name.clone();

        let assertion = match name.as_str() {
            "exists" | "notExists" => {
                let presence = Presence {
                    target: fields.body()?,
                    count,
                    timeout,
                };
                if name == "exists" {
                    Assertion::Exists(presence)
                } else {
                    if presence.count.is_some() {
                        return Err(CheckError::invalid("`count` is not supported by `notExists`"));
                    }
                    Assertion::NotExists(presence)
                }
            }
            "likes" | "notLikes" => {
                if fields.rest.contains_key("values") {
                    return Err(CheckError::invalid(format!(
                        "`{}` accepts only a single `value`",
                        name
                    )));
                }
                let (expected, extract) = match fields.attr_shorthand()? {
                    Some((attr, value)) => (value, Some(ValueKind::Attr(attr))),
                    None => (
                        fields
                            .take("value")?
                            .ok_or_else(|| CheckError::invalid(format!("`{}` requires a `value`", name)))?,
                        fields.value_kind()?,
                    ),
                };
                let compare = Compare {
                    target: Target::parse(fields.body.take())?,
                    expected,
                    extract,
                    count,
                    timeout,
                };
                if name == "likes" {
                    Assertion::Likes(compare)
                } else {
                    Assertion::NotLikes(compare)
                }
            }
            "satisfies" => Assertion::Satisfies(Compare {
                target: Target::parse(fields.body.take())?,
                expected: fields
                    .take("predicate")?
                    .ok_or_else(|| CheckError::invalid("`satisfies` requires a `predicate`"))?,
                extract: fields.value_kind()?,
                count,
                timeout,
            }),
            _ => {
                let (expected, extract) = match fields.attr_shorthand()? {
                    Some((attr, value)) => (Expected::One(value), Some(ValueKind::Attr(attr))),
                    None => (fields.expected()?, fields.value_kind()?),
                };
                let compare = Compare {
                    target: Target::parse(fields.body.take())?,
                    expected,
                    extract,
                    count,
                    timeout,
                };
                match name.as_str() {
                    "equals" => Assertion::Equals(compare),
                    "notEquals" => Assertion::NotEquals(compare),
                    "checked" => Assertion::Checked(compare),
                    "unchecked" => Assertion::Unchecked(compare),
                    "selected" => Assertion::Selected(compare),
                    _ => Assertion::Unselected(compare),
                }
            }
        };

        fields.finish()?;
        Ok(assertion)
    }
}

impl Serialize for Assertion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl Resolve for Assertion {
    fn resolve(&self, p: &Placeholders) -> Result<Self> {
        Ok(match self {
            Assertion::Exists(x) => Assertion::Exists(x.resolve(p)?),
            Assertion::NotExists(x) => Assertion::NotExists(x.resolve(p)?),
            Assertion::Equals(x) => Assertion::Equals(x.resolve(p)?),
            Assertion::NotEquals(x) => Assertion::NotEquals(x.resolve(p)?),
            Assertion::Likes(x) => Assertion::Likes(x.resolve(p)?),
            Assertion::NotLikes(x) => Assertion::NotLikes(x.resolve(p)?),
            Assertion::Checked(x) => Assertion::Checked(x.resolve(p)?),
            Assertion::Unchecked(x) => Assertion::Unchecked(x.resolve(p)?),
            Assertion::Selected(x) => Assertion::Selected(x.resolve(p)?),
            Assertion::Unselected(x) => Assertion::Unselected(x.resolve(p)?),
            Assertion::Satisfies(x) => Assertion::Satisfies(x.resolve(p)?),
        })
    }
}

/// A directive map split into its directive key, the directive's value and
/// the remaining modifier keys.
struct DirectiveFields {
    name: String,
    body: Value,
    rest: Map<String, Value>,
}

impl DirectiveFields {
    fn split(
        mut map: Map<String, Value>,
        what: &str,
        directives: &[&str],
        modifiers: &[&str],
    ) -> Result<Self> {
        let keys: Vec<String> = map
            .keys()
            .filter(|key| !modifiers.contains(&key.as_str()) && !key.starts_with(ATTR_PREFIX))
            .cloned()
            .collect();

        let name = match keys.as_slice() {
            [name] => name.clone(),
            [] => return Err(CheckError::invalid(format!("{} has no directive", what))),
            many => {
                return Err(CheckError::invalid(format!(
                    "{} has more than one directive: {}",
                    what,
                    many.join(", ")
                )))
            }
        };

        if !directives.contains(&name.as_str()) {
            return Err(CheckError::invalid(format!(
                "unknown {} directive `{}`",
                what, name
            )));
        }

        let body = map.remove(&name).unwrap_or(Value::Null);
        Ok(Self { name, body, rest: map })
    }

    /// Deserialize the directive's own value.
    fn body<T: DeserializeOwned>(&mut self) -> Result<T> {
        parse_field(&self.name, self.body.take())
    }

    fn take<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        self.rest
            .remove(key)
            .map(|value| parse_field(key, value))
            .transpose()
    }

    fn timeout(&mut self) -> Result<Option<Duration>> {
        Ok(self.take::<u64>("timeout")?.map(Duration::from_millis))
    }

    fn value_kind(&mut self) -> Result<Option<ValueKind>> {
        self.rest.remove("type").map(ValueKind::parse).transpose()
    }

    /// `attr_<name>: value`, standing for `type: {attr: <name>}` plus `value`
    fn attr_shorthand(&mut self) -> Result<Option<(String, Deferred<String>)>> {
        let keys: Vec<String> = self
            .rest
            .keys()
            .filter(|key| key.starts_with(ATTR_PREFIX))
            .cloned()
            .collect();

        let key = match keys.as_slice() {
            [] => return Ok(None),
            [key] => key.clone(),
            many => {
                return Err(CheckError::invalid(format!(
                    "`{}` declares more than one attr_ key: {}",
                    self.name,
                    many.join(", ")
                )))
            }
        };

        let attr = key[ATTR_PREFIX.len()..].to_string();
        if attr.is_empty() {
            return Err(CheckError::invalid(format!("`{}` names no attribute", key)));
        }
        if let Some(other) = ["type", "value", "values"].iter().find(|k| self.rest.contains_key(**k)) {
            return Err(CheckError::invalid(format!(
                "`{}` cannot be combined with `{}`",
                key, other
            )));
        }

        let value = self.rest.remove(&key).unwrap_or(Value::Null);
        Ok(Some((attr, parse_field(&key, value)?)))
    }

    /// `value` XOR `values`
    fn expected(&mut self) -> Result<Expected> {
        let value = self.take("value")?;
        let values = self.take("values")?;
        match (value, values) {
            (Some(value), None) => Ok(Expected::One(value)),
            (None, Some(values)) => Ok(Expected::Many(values)),
            (Some(_), Some(_)) => Err(CheckError::invalid(format!(
                "`{}` declares both `value` and `values`",
                self.name
            ))),
            (None, None) => Err(CheckError::invalid(format!(
                "`{}` requires `value` or `values`",
                self.name
            ))),
        }
    }

    fn expected_list(&mut self) -> Result<Vec<Deferred<String>>> {
        Ok(match self.expected()? {
            Expected::One(value) => vec![value],
            Expected::Many(values) => values,
        })
    }

    /// Reject modifiers the directive did not consume.
    fn finish(self) -> Result<()> {
        match self.rest.keys().next() {
            Some(key) => Err(CheckError::invalid(format!(
                "`{}` is not supported by `{}`",
                key, self.name
            ))),
            None => Ok(()),
        }
    }
}

fn parse_field<T: DeserializeOwned>(key: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| CheckError::invalid(format!("invalid `{}`: {}", key, e)))
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
