//! [`Driver`] over the W3C WebDriver protocol
//!
//! Talks to chromedriver / geckodriver through `fantoccini`. Console logs are
//! read from the Chrome log endpoint; browsers without it report no entries.

use std::time::Duration;

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::wd::WebDriverCompatibleCommand;
use fantoccini::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use crate::driver::{Driver, DriverError, DriverResult, LogEntry};
use crate::locator::Locator;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chrome,
    Firefox,
}

/// Connection settings for a WebDriver server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    pub url: String,
    pub browser: Browser,
    pub headless: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9515".to_string(),
            browser: Browser::Chrome,
            headless: true,
        }
    }
}

impl WebDriverConfig {
    fn capabilities(&self) -> Map<String, Value> {
        let mut caps = Map::new();
        match self.browser {
            Browser::Chrome => {
                let mut args = vec!["--no-sandbox", "--disable-dev-shm-usage"];
                if self.headless {
                    args.push("--headless=new");
                    args.push("--disable-gpu");
                }
                caps.insert("browserName".to_string(), json!("chrome"));
                caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
                caps.insert("goog:loggingPrefs".to_string(), json!({ "browser": "ALL" }));
            }
            Browser::Firefox => {
                let args: Vec<&str> = if self.headless { vec!["--headless"] } else { vec![] };
                caps.insert("browserName".to_string(), json!("firefox"));
                caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
            }
        }
        caps
    }
}

/// `POST /session/{id}/se/log`, the Selenium log extension served by
/// chromedriver.
#[derive(Debug)]
struct BrowserLogs;

impl WebDriverCompatibleCommand for BrowserLogs {
    fn endpoint(&self, base_url: &url::Url, session_id: Option<&str>) -> Result<url::Url, url::ParseError> {
        base_url.join(&format!("session/{}/se/log", session_id.unwrap_or_default()))
    }

    fn method_and_body(&self, _request_url: &url::Url) -> (http::Method, Option<String>) {
        (http::Method::POST, Some(json!({ "type": "browser" }).to_string()))
    }
}

fn driver_error(err: CmdError) -> DriverError {
    match err {
        CmdError::WaitTimeout => DriverError::Timeout("condition".to_string()),
        ref e if e.is_no_such_alert() => DriverError::NoSuchAlert,
        CmdError::Standard(ref wd) if wd.error == ErrorStatus::StaleElementReference => {
            DriverError::StaleElement(err.to_string())
        }
        other => DriverError::Command(other.to_string()),
    }
}

/// CSS form of the strategies fantoccini has no native variant for.
fn css_fallback(locator: &Locator) -> Option<String> {
    match locator {
        Locator::Name(name) => Some(format!("[name=\"{}\"]", name.replace('"', "\\\""))),
        Locator::ClassName(class) => Some(format!(".{}", class)),
        Locator::TagName(tag) => Some(tag.clone()),
        _ => None,
    }
}

fn native<'a>(locator: &'a Locator, fallback: Option<&'a str>) -> fantoccini::Locator<'a> {
    match (locator, fallback) {
        (_, Some(css)) => fantoccini::Locator::Css(css),
        (Locator::Xpath(xpath), None) => fantoccini::Locator::XPath(xpath),
        (Locator::Id(id), None) => fantoccini::Locator::Id(id),
        (Locator::LinkText(text), None) => fantoccini::Locator::LinkText(text),
        (other, None) => fantoccini::Locator::Css(other.selector()),
    }
}

/// A WebDriver session.
pub struct WebDriver {
    client: Client,
}

impl WebDriver {
    /// Open a new session
    pub async fn connect(config: &WebDriverConfig) -> DriverResult<Self> {
        debug!(url = %config.url, browser = ?config.browser, "connecting to webdriver");
        let client = ClientBuilder::native()
            .capabilities(config.capabilities())
            .connect(&config.url)
            .await
            .map_err(|e| DriverError::Session(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing session
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// End the session
    pub async fn close(self) -> DriverResult<()> {
        self.client.close().await.map_err(driver_error)
    }

    async fn wait_alert(&self, timeout: Duration) -> DriverResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.client.get_alert_text().await {
                Ok(_) => return Ok(()),
                Err(ref e) if e.is_no_such_alert() && Instant::now() < deadline => sleep(POLL_INTERVAL).await,
                Err(ref e) if e.is_no_such_alert() => {
                    return Err(DriverError::Timeout("native dialog".to_string()))
                }
                Err(e) => return Err(driver_error(e)),
            }
        }
    }
}

#[async_trait]
impl Driver for WebDriver {
    type Element = Element;

    async fn goto(&self, url: &str) -> DriverResult<()> {
        self.client.goto(url).await.map_err(driver_error)
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.client.current_url().await.map_err(driver_error)?.to_string())
    }

    async fn outer_html(&self) -> DriverResult<String> {
        let value = self
            .client
            .execute("return document.documentElement.outerHTML;", vec![])
            .await
            .map_err(driver_error)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Element>> {
        let fallback = css_fallback(locator);
        let loc = native(locator, fallback.as_deref());
        self.client.find_all(loc).await.map_err(driver_error)
    }

    async fn find_all_in(&self, parent: &Element, locator: &Locator) -> DriverResult<Vec<Element>> {
        let fallback = css_fallback(locator);
        let loc = native(locator, fallback.as_deref());
        parent.find_all(loc).await.map_err(driver_error)
    }

    async fn wait_located(&self, locator: &Locator, timeout: Duration) -> DriverResult<Element> {
        let fallback = css_fallback(locator);
        let loc = native(locator, fallback.as_deref());
        self.client
            .wait()
            .at_most(timeout)
            .every(POLL_INTERVAL)
            .for_element(loc)
            .await
            .map_err(|e| match e {
                CmdError::WaitTimeout => DriverError::Timeout(locator.to_string()),
                other => driver_error(other),
            })
    }

    async fn wait_visible(&self, element: &Element, timeout: Duration) -> DriverResult<Element> {
        let deadline = Instant::now() + timeout;
        loop {
            if element.is_displayed().await.map_err(driver_error)? {
                return Ok(element.clone());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout("element visibility".to_string()));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn is_displayed(&self, element: &Element) -> DriverResult<bool> {
        element.is_displayed().await.map_err(driver_error)
    }

    async fn tag_name(&self, element: &Element) -> DriverResult<String> {
        element.tag_name().await.map_err(driver_error)
    }

    async fn attribute(&self, element: &Element, name: &str) -> DriverResult<Option<String>> {
        // the live value is a property, the attribute only holds the initial one
        let value = if name == "value" {
            element.prop(name).await
        } else {
            element.attr(name).await
        };
        value.map_err(driver_error)
    }

    async fn text(&self, element: &Element) -> DriverResult<String> {
        element.text().await.map_err(driver_error)
    }

    async fn is_selected(&self, element: &Element) -> DriverResult<bool> {
        element.is_selected().await.map_err(driver_error)
    }

    async fn click(&self, element: &Element) -> DriverResult<()> {
        element.click().await.map_err(driver_error)
    }

    async fn send_keys(&self, element: &Element, text: &str) -> DriverResult<()> {
        element.send_keys(text).await.map_err(driver_error)
    }

    async fn clear(&self, element: &Element) -> DriverResult<()> {
        element.clear().await.map_err(driver_error)
    }

    async fn console_logs(&self) -> DriverResult<Vec<LogEntry>> {
        let value = match self.client.issue_cmd(BrowserLogs).await {
            Ok(value) => value,
            Err(e) => {
                trace!(error = %e, "browser log endpoint unavailable");
                return Ok(Vec::new());
            }
        };

        let entries = value
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| {
                        LogEntry::new(
                            entry["level"].as_str().unwrap_or_default(),
                            entry["message"].as_str().unwrap_or_default(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(entries)
    }

    async fn switch_to_frame(&self, locator: &Locator) -> DriverResult<()> {
        let fallback = css_fallback(locator);
        let frame = self
            .client
            .find(native(locator, fallback.as_deref()))
            .await
            .map_err(driver_error)?;
        frame.enter_frame().await.map_err(driver_error)
    }

    async fn switch_to_default_frame(&self) -> DriverResult<()> {
        self.client.enter_frame(None).await.map_err(driver_error)
    }

    async fn accept_alert(&self, timeout: Duration) -> DriverResult<()> {
        self.wait_alert(timeout).await?;
        self.client.accept_alert().await.map_err(driver_error)
    }

    async fn dismiss_alert(&self, timeout: Duration) -> DriverResult<()> {
        self.wait_alert(timeout).await?;
        self.client.dismiss_alert().await.map_err(driver_error)
    }
}
