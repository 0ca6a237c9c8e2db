//! Assertion dispatch
//!
//! [`Assertions::verify`] polls an assertion until it holds or its timeout
//! elapses and raises the matching failure. [`Assertions::holds`] evaluates
//! the same assertion once, as a boolean, for `execif` guards.

use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::compare;
use crate::config::CheckerConfig;
use crate::driver::Driver;
use crate::error::{CheckError, Mismatch, Result};
use crate::extract::{extract, Extracted};
use crate::poll::{is_transient, wait_absent, wait_elements, Polled, Poller};
use crate::scenario::{Assertion, Compare, Presence, Target, ValueKind};

/// A named pure predicate over extracted values, used by `satisfies`.
pub type PredicateFn = Arc<dyn Fn(&[String]) -> bool + Send + Sync>;

/// Predicates available to `satisfies` assertions.
#[derive(Clone, Default)]
pub struct PredicateRegistry {
    predicates: HashMap<String, PredicateFn>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(name.into(), Arc::new(predicate));
    }

    pub fn get(&self, name: &str) -> Option<&PredicateFn> {
        self.predicates.get(name)
    }
}

impl fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.predicates.keys().collect();
        names.sort();
        f.debug_struct("PredicateRegistry").field("predicates", &names).finish()
    }
}

enum Policy<'a> {
    Equals,
    NotEquals,
    Likes,
    NotLikes,
    ContainsAll,
    ContainsNone,
    Predicate(&'a PredicateFn),
}

/// A value assertion flattened into what the polling loop needs.
struct ValueCheck<'a> {
    directive: &'static str,
    target: &'a Target,
    extract: Option<&'a ValueKind>,
    count: Option<usize>,
    timeout: Option<Duration>,
    expected: Vec<String>,
    policy: Policy<'a>,
}

impl<'a> ValueCheck<'a> {
    fn new<E>(
        directive: &'static str,
        compare: &'a Compare<E>,
        expected: Vec<String>,
        policy: Policy<'a>,
    ) -> Self {
        Self {
            directive,
            target: &compare.target,
            extract: compare.extract.as_ref(),
            count: compare.count,
            timeout: compare.timeout,
            expected,
            policy,
        }
    }

    fn holds(&self, extracted: &Extracted) -> Result<bool> {
        if self.count.is_some_and(|count| count != extracted.matched) {
            return Ok(false);
        }
        let actual = &extracted.values;
        Ok(match &self.policy {
            Policy::Equals => compare::equals(actual, &self.expected),
            Policy::NotEquals => !compare::equals(actual, &self.expected),
            Policy::Likes => compare::likes(actual, self.first_expected())?,
            Policy::NotLikes => !compare::likes(actual, self.first_expected())?,
            Policy::ContainsAll => compare::contains_all(actual, &self.expected),
            Policy::ContainsNone => compare::contains_none(actual, &self.expected),
            Policy::Predicate(predicate) => predicate(actual),
        })
    }

    fn first_expected(&self) -> &str {
        self.expected.first().map(String::as_str).unwrap_or_default()
    }

    fn mismatch(&self, extracted: Extracted) -> Mismatch {
        let kind = match self.count {
            Some(count) if count != extracted.matched => format!(
                "{} ({} elements, expected {})",
                extracted.kind, extracted.matched, count
            ),
            _ => extracted.kind.to_string(),
        };
        Mismatch {
            directive: self.directive,
            target: self.target.describe(),
            kind,
            expected: self.expected.clone(),
            actual: extracted.values,
        }
    }
}

/// Assertion handlers bound to one driver session.
pub struct Assertions<'a, D: Driver> {
    driver: &'a D,
    config: &'a CheckerConfig,
    predicates: &'a PredicateRegistry,
}

impl<'a, D: Driver> Assertions<'a, D> {
    pub fn new(driver: &'a D, config: &'a CheckerConfig, predicates: &'a PredicateRegistry) -> Self {
        Self {
            driver,
            config,
            predicates,
        }
    }

    fn poller(&self, timeout: Option<Duration>) -> Poller {
        Poller::new(
            timeout.unwrap_or_else(|| self.config.default_timeout()),
            self.config.poll_interval(),
        )
    }

    /// Poll `assertion` until it holds, or fail with the last observation.
    pub async fn verify(&self, assertion: &Assertion) -> Result<()> {
        debug!(directive = assertion.directive(), "verifying assertion");

        match assertion {
            Assertion::Exists(presence) => self.verify_exists(presence).await,
            Assertion::NotExists(presence) => self.verify_not_exists(presence).await,
            _ => {
                let check = self.value_check(assertion)?;
                self.verify_value(&check).await
            }
        }
    }

    /// Evaluate `assertion` once as a boolean. Only configuration errors
    /// escape; every other failure reads as `false`.
    pub async fn holds(&self, assertion: &Assertion) -> Result<bool> {
        let outcome = match assertion {
            Assertion::Exists(presence) => self.located(presence).await,
            Assertion::NotExists(presence) => self.located(presence).await.map(|found| !found),
            _ => {
                let check = self.value_check(assertion)?;
                self.holds_value(&check).await
            }
        };

        match outcome {
            Err(e) if !e.is_configuration() => {
                debug!(directive = assertion.directive(), error = %e, "guard check failed, treating as false");
                Ok(false)
            }
            other => other,
        }
    }

    async fn verify_exists(&self, presence: &Presence) -> Result<()> {
        let locator = presence.target.get()?;
        let poller = self.poller(presence.timeout);

        match wait_elements(self.driver, locator, presence.count, poller).await? {
            Polled::Ready(_) => Ok(()),
            Polled::TimedOut(matched) => {
                let locator = match presence.count {
                    Some(count) if matched > 0 => {
                        format!("{} ({} elements, expected {})", locator, matched, count)
                    }
                    _ => locator.to_string(),
                };
                Err(CheckError::NoSuchElement {
                    directive: "exists".to_string(),
                    locator,
                    timeout_ms: poller.timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn verify_not_exists(&self, presence: &Presence) -> Result<()> {
        let locator = presence.target.get()?;
        let poller = self.poller(presence.timeout);

        match wait_absent(self.driver, locator, poller).await? {
            Polled::Ready(()) => Ok(()),
            Polled::TimedOut(_) => Err(CheckError::ElementExists {
                directive: "notExists".to_string(),
                locator: locator.to_string(),
                timeout_ms: poller.timeout.as_millis() as u64,
            }),
        }
    }

    /// Did the locator resolve to visible elements within its timeout?
    async fn located(&self, presence: &Presence) -> Result<bool> {
        let locator = presence.target.get()?;
        let outcome = wait_elements(self.driver, locator, presence.count, self.poller(presence.timeout)).await?;
        Ok(matches!(outcome, Polled::Ready(_)))
    }

    fn value_check<'c>(&'c self, assertion: &'c Assertion) -> Result<ValueCheck<'c>> {
        let directive = assertion.directive();
        Ok(match assertion {
            Assertion::Equals(c) => ValueCheck::new(directive, c, c.expected.values()?, Policy::Equals),
            Assertion::NotEquals(c) => ValueCheck::new(directive, c, c.expected.values()?, Policy::NotEquals),
            Assertion::Checked(c) | Assertion::Selected(c) => {
                ValueCheck::new(directive, c, c.expected.values()?, Policy::ContainsAll)
            }
            Assertion::Unchecked(c) | Assertion::Unselected(c) => {
                ValueCheck::new(directive, c, c.expected.values()?, Policy::ContainsNone)
            }
            Assertion::Likes(c) => ValueCheck::new(directive, c, vec![c.expected.get()?.clone()], Policy::Likes),
            Assertion::NotLikes(c) => {
                ValueCheck::new(directive, c, vec![c.expected.get()?.clone()], Policy::NotLikes)
            }
            Assertion::Satisfies(c) => {
                let name = &c.expected.0;
                let predicate = self
                    .predicates
                    .get(name)
                    .ok_or_else(|| CheckError::invalid(format!("unknown predicate `{}`", name)))?;
                ValueCheck::new(directive, c, vec![name.clone()], Policy::Predicate(predicate))
            }
            Assertion::Exists(_) | Assertion::NotExists(_) => {
                return Err(CheckError::invalid(format!(
                    "`{}` does not compare values",
                    directive
                )))
            }
        })
    }

    /// One extraction; `None` when nothing was located.
    async fn sample(&self, check: &ValueCheck<'_>) -> Result<Option<Extracted>> {
        match extract(self.driver, check.target, check.extract).await {
            Err(CheckError::Driver(e)) if is_transient(&e) => Ok(None),
            other => other,
        }
    }

    async fn verify_value(&self, check: &ValueCheck<'_>) -> Result<()> {
        let poller = self.poller(check.timeout);

        let outcome = poller
            .run(|| async move {
                let Some(extracted) = self.sample(check).await? else {
                    return Ok(ControlFlow::Continue(None));
                };
                if check.holds(&extracted)? {
                    Ok(ControlFlow::Break(()))
                } else {
                    Ok(ControlFlow::Continue(Some(extracted)))
                }
            })
            .await?;

        match outcome {
            Polled::Ready(()) => Ok(()),
            Polled::TimedOut(Some(extracted)) => {
                debug!(directive = check.directive, "value assertion timed out");
                Err(check.mismatch(extracted).into())
            }
            Polled::TimedOut(None) => Err(CheckError::NoSuchElement {
                directive: check.directive.to_string(),
                locator: check.target.describe(),
                timeout_ms: poller.timeout.as_millis() as u64,
            }),
        }
    }

    async fn holds_value(&self, check: &ValueCheck<'_>) -> Result<bool> {
        match self.sample(check).await? {
            Some(extracted) => check.holds(&extracted),
            None => Ok(false),
        }
    }
}
