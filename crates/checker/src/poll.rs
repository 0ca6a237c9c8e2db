//! Polling discipline and element waits
//!
//! Every eventually-true condition goes through [`Poller::run`]: the attempt is
//! repeated with a fixed delay until it reports success or the timeout
//! elapses. There is always at least one attempt, even with a zero timeout.
//! Only the last observation survives a timeout; intermediate attempts are
//! never reported.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::driver::{Driver, DriverError, DriverResult};
use crate::error::Result;
use crate::locator::Locator;

/// Outcome of a polling loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Polled<T, O> {
    Ready(T),
    /// Timeout elapsed; carries the last observation
    TimedOut(O),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Poller {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Poller {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Repeat `attempt` until it breaks or the timeout elapses. Errors abort
    /// the loop immediately.
    pub async fn run<T, O, F, Fut>(&self, mut attempt: F) -> Result<Polled<T, O>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ControlFlow<T, O>>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut attempts = 0usize;

        loop {
            attempts += 1;
            match attempt().await? {
                ControlFlow::Break(value) => return Ok(Polled::Ready(value)),
                ControlFlow::Continue(observed) => {
                    let now = Instant::now();
                    if now >= deadline {
                        trace!(attempts, "polling timed out");
                        return Ok(Polled::TimedOut(observed));
                    }
                    sleep(self.interval.min(deadline - now)).await;
                }
            }
        }
    }
}

/// Errors a later attempt may not see again.
pub(crate) fn is_transient(err: &DriverError) -> bool {
    matches!(err, DriverError::StaleElement(_) | DriverError::Timeout(_))
}

/// Wait for one located and visible element using the driver's own waits.
pub async fn wait_element<D: Driver>(
    driver: &D,
    locator: &Locator,
    timeout: Duration,
) -> DriverResult<D::Element> {
    let element = driver.wait_located(locator, timeout).await?;
    driver.wait_visible(&element, timeout).await
}

/// Wait until `locator` matches visible elements, exactly `count` of them
/// when given. On timeout reports how many elements matched last.
pub async fn wait_elements<D: Driver>(
    driver: &D,
    locator: &Locator,
    count: Option<usize>,
    poller: Poller,
) -> Result<Polled<Vec<D::Element>, usize>> {
    poller
        .run(|| async move {
            let elements = match driver.find_all(locator).await {
                Ok(elements) => elements,
                Err(e) if is_transient(&e) => return Ok(ControlFlow::Continue(0)),
                Err(e) => return Err(e.into()),
            };

            let matched = elements.len();
            if matched == 0 || count.is_some_and(|expected| expected != matched) {
                return Ok(ControlFlow::Continue(matched));
            }

            match driver.is_displayed(&elements[0]).await {
                Ok(true) => Ok(ControlFlow::Break(elements)),
                Ok(false) => Ok(ControlFlow::Continue(matched)),
                Err(e) if is_transient(&e) => Ok(ControlFlow::Continue(matched)),
                Err(e) => Err(e.into()),
            }
        })
        .await
}

/// Wait until no element matched by `locator` is displayed. On timeout
/// reports how many elements were still visible.
pub async fn wait_absent<D: Driver>(
    driver: &D,
    locator: &Locator,
    poller: Poller,
) -> Result<Polled<(), usize>> {
    poller
        .run(|| async move {
            let elements = match driver.find_all(locator).await {
                Ok(elements) => elements,
                Err(e) if is_transient(&e) => return Ok(ControlFlow::Continue(1)),
                Err(e) => return Err(e.into()),
            };

            let mut visible = 0;
            for element in &elements {
                match driver.is_displayed(element).await {
                    Ok(true) => visible += 1,
                    Ok(false) => {}
                    // detached between lookup and read
                    Err(e) if is_transient(&e) => {}
                    Err(e) => return Err(e.into()),
                }
            }

            if visible == 0 {
                Ok(ControlFlow::Break(()))
            } else {
                Ok(ControlFlow::Continue(visible))
            }
        })
        .await
}
