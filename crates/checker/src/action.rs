//! Action dispatch
//!
//! Every action waits for its target before mutating anything. Group actions
//! (`check`, `select`, `unselect`, checkbox `clear`) only click the members
//! whose state differs from the requested one, so repeating an action is
//! harmless.

use std::time::Duration;

use tracing::debug;

use crate::config::CheckerConfig;
use crate::driver::{Driver, DriverError};
use crate::error::{CheckError, Result};
use crate::locator::Locator;
use crate::placeholder::Deferred;
use crate::poll::{wait_element, wait_elements, Polled, Poller};
use crate::scenario::{Action, AlertAnswer, ClearMode, FrameTarget};

/// Action handlers bound to one driver session.
pub struct Actions<'a, D: Driver> {
    driver: &'a D,
    config: &'a CheckerConfig,
}

impl<'a, D: Driver> Actions<'a, D> {
    pub fn new(driver: &'a D, config: &'a CheckerConfig) -> Self {
        Self { driver, config }
    }

    pub async fn perform(&self, action: &Action) -> Result<()> {
        let directive = action.directive();
        let timeout = action.timeout().unwrap_or_else(|| self.config.default_timeout());
        debug!(directive, "performing action");

        match action {
            Action::Click { target, .. } => {
                let element = self.element(directive, target.get()?, timeout).await?;
                self.driver.click(&element).await?;
            }
            Action::SendKeys { target, value, .. } => {
                let element = self.element(directive, target.get()?, timeout).await?;
                self.driver.send_keys(&element, value.get()?).await?;
            }
            Action::Clear {
                target,
                mode: ClearMode::Text,
                ..
            } => {
                let element = self.element(directive, target.get()?, timeout).await?;
                self.driver.clear(&element).await?;
            }
            Action::Clear {
                target,
                mode: ClearMode::Checkbox,
                ..
            } => {
                for element in self.group(directive, target.get()?, timeout).await? {
                    if self.driver.is_selected(&element).await? {
                        self.driver.click(&element).await?;
                    }
                }
            }
            Action::Check { target, values, .. } => {
                let locator = target.get()?;
                let elements = self.group(directive, locator, timeout).await?;
                self.toggle(directive, locator, &elements, values, true).await?;
            }
            Action::Select { target, values, .. } => {
                let locator = target.get()?;
                let options = self.options(directive, locator, timeout).await?;
                self.toggle(directive, locator, &options, values, true).await?;
            }
            Action::Unselect { target, values, .. } => {
                let locator = target.get()?;
                let options = self.options(directive, locator, timeout).await?;
                self.toggle(directive, locator, &options, values, false).await?;
            }
            Action::Alert { answer, .. } => {
                let answered = match answer {
                    AlertAnswer::Accept => self.driver.accept_alert(timeout).await,
                    AlertAnswer::Dismiss => self.driver.dismiss_alert(timeout).await,
                };
                answered.map_err(|e| match e {
                    DriverError::Timeout(_) | DriverError::NoSuchAlert => CheckError::NoSuchElement {
                        directive: directive.to_string(),
                        locator: "native dialog".to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    },
                    other => other.into(),
                })?;
            }
            Action::SwitchTo { frame, .. } => match frame {
                FrameTarget::Default => self.driver.switch_to_default_frame().await?,
                FrameTarget::Frame(locator) => {
                    let locator = locator.get()?;
                    self.element(directive, locator, timeout).await?;
                    self.driver.switch_to_frame(locator).await?;
                }
            },
        }

        Ok(())
    }

    /// One located, visible element.
    async fn element(&self, directive: &str, locator: &Locator, timeout: Duration) -> Result<D::Element> {
        wait_element(self.driver, locator, timeout)
            .await
            .map_err(|e| match e {
                DriverError::Timeout(_) => not_found(directive, locator.to_string(), timeout),
                other => other.into(),
            })
    }

    /// Every element of a visible group.
    async fn group(&self, directive: &str, locator: &Locator, timeout: Duration) -> Result<Vec<D::Element>> {
        let poller = Poller::new(timeout, self.config.poll_interval());
        match wait_elements(self.driver, locator, None, poller).await? {
            Polled::Ready(elements) => Ok(elements),
            Polled::TimedOut(_) => Err(not_found(directive, locator.to_string(), timeout)),
        }
    }

    /// Options of the `<select>` matched by `locator`.
    async fn options(&self, directive: &str, locator: &Locator, timeout: Duration) -> Result<Vec<D::Element>> {
        let select = self.element(directive, locator, timeout).await?;
        Ok(self.driver.find_all_in(&select, &Locator::css("option")).await?)
    }

    /// Click every element whose value is requested and whose selection
    /// state is not `selected` yet.
    async fn toggle(
        &self,
        directive: &str,
        locator: &Locator,
        elements: &[D::Element],
        values: &[Deferred<String>],
        selected: bool,
    ) -> Result<()> {
        for requested in values {
            let requested = requested.get()?;
            let mut found = false;

            for element in elements {
                let value = self.driver.attribute(element, "value").await?;
                if value.as_deref() != Some(requested.as_str()) {
                    continue;
                }
                found = true;
                if self.driver.is_selected(element).await? != selected {
                    self.driver.click(element).await?;
                }
            }

            if !found {
                return Err(CheckError::NoSuchElement {
                    directive: directive.to_string(),
                    locator: format!("{} with value `{}`", locator, requested),
                    timeout_ms: 0,
                });
            }
        }
        Ok(())
    }
}

fn not_found(directive: &str, locator: String, timeout: Duration) -> CheckError {
    CheckError::NoSuchElement {
        directive: directive.to_string(),
        locator,
        timeout_ms: timeout.as_millis() as u64,
    }
}
