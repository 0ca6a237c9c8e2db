//! Value extraction
//!
//! Turns the elements matched by an assertion's target into a list of strings
//! plus a label describing where the strings came from. The strategy depends
//! on the declared `type` and on the shape of the first matched element:
//!
//! 1. `{attr: name}`: that attribute of every element
//! 2. `<select>`: values of the selected options
//! 3. checkbox / radio inputs: values of the checked elements
//! 4. other `<input>`: their values
//! 5. anything else: rendered inner text
//!
//! The `html` and `url` pseudo-targets bypass element matching.

use std::fmt;

use crate::driver::Driver;
use crate::error::Result;
use crate::locator::Locator;
use crate::scenario::{Target, ValueKind};

/// Which extraction produced a list of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractKind {
    Select,
    Checkbox,
    Radio,
    Input,
    InnerText,
    Attribute(String),
    Html,
    Url,
}

impl fmt::Display for ExtractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractKind::Select => f.write_str("select value"),
            ExtractKind::Checkbox => f.write_str("checkbox value"),
            ExtractKind::Radio => f.write_str("radio value"),
            ExtractKind::Input => f.write_str("input value"),
            ExtractKind::InnerText => f.write_str("inner text"),
            ExtractKind::Attribute(name) => write!(f, "{} attribute", name),
            ExtractKind::Html => f.write_str("html"),
            ExtractKind::Url => f.write_str("url"),
        }
    }
}

/// Actual values of one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub values: Vec<String>,
    pub kind: ExtractKind,
    /// Number of elements the target matched (1 for pseudo-targets)
    pub matched: usize,
}

/// Extract the current values of `target`. `None` when the locator matched
/// no element.
pub async fn extract<D: Driver>(
    driver: &D,
    target: &Target,
    kind: Option<&ValueKind>,
) -> Result<Option<Extracted>> {
    match target {
        Target::Html => Ok(Some(Extracted {
            values: vec![driver.outer_html().await?],
            kind: ExtractKind::Html,
            matched: 1,
        })),
        Target::Url => Ok(Some(Extracted {
            values: vec![driver.current_url().await?],
            kind: ExtractKind::Url,
            matched: 1,
        })),
        Target::Element(locator) => {
            let elements = driver.find_all(locator.get()?).await?;
            if elements.is_empty() {
                return Ok(None);
            }
            extract_from(driver, &elements, kind).await.map(Some)
        }
    }
}

/// Extract values from already-located elements.
pub async fn extract_from<D: Driver>(
    driver: &D,
    elements: &[D::Element],
    kind: Option<&ValueKind>,
) -> Result<Extracted> {
    let matched = elements.len();
    let kind = match kind {
        Some(ValueKind::Attr(name)) => {
            let mut values = Vec::with_capacity(matched);
            for element in elements {
                values.push(driver.attribute(element, name).await?.unwrap_or_default());
            }
            return Ok(Extracted {
                values,
                kind: ExtractKind::Attribute(name.clone()),
                matched,
            });
        }
        Some(ValueKind::Select) => ExtractKind::Select,
        Some(ValueKind::Checkbox) => ExtractKind::Checkbox,
        Some(ValueKind::Radio) => ExtractKind::Radio,
        None => match elements.first() {
            Some(first) => detect(driver, first).await?,
            None => ExtractKind::InnerText,
        },
    };

    let mut values = Vec::new();
    match kind {
        ExtractKind::Select => {
            let option = Locator::css("option");
            for select in elements {
                for opt in driver.find_all_in(select, &option).await? {
                    if driver.is_selected(&opt).await? {
                        values.push(value_of(driver, &opt).await?);
                    }
                }
            }
        }
        ExtractKind::Checkbox | ExtractKind::Radio => {
            for element in elements {
                if driver.is_selected(element).await? {
                    values.push(value_of(driver, element).await?);
                }
            }
        }
        ExtractKind::Input => {
            for element in elements {
                values.push(value_of(driver, element).await?);
            }
        }
        _ => {
            for element in elements {
                values.push(driver.text(element).await?);
            }
        }
    }

    Ok(Extracted {
        values,
        kind,
        matched,
    })
}

async fn detect<D: Driver>(driver: &D, element: &D::Element) -> Result<ExtractKind> {
    let tag = driver.tag_name(element).await?.to_ascii_lowercase();
    if tag == "select" {
        return Ok(ExtractKind::Select);
    }

    let input_type = driver
        .attribute(element, "type")
        .await?
        .map(|t| t.to_ascii_lowercase());
    Ok(match input_type.as_deref() {
        Some("checkbox") => ExtractKind::Checkbox,
        Some("radio") => ExtractKind::Radio,
        _ if tag == "input" => ExtractKind::Input,
        _ => ExtractKind::InnerText,
    })
}

async fn value_of<D: Driver>(driver: &D, element: &D::Element) -> Result<String> {
    Ok(driver.attribute(element, "value").await?.unwrap_or_default())
}
