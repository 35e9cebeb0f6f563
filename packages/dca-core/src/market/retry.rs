//! Retry with exponential backoff for quote fetches.

use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

use super::provider::QuoteProvider;
use crate::types::PriceSeries;
use crate::{Error, Result};

/// How many times to try a fetch and how long to wait in between.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Wait after the first failure
    pub base_delay: Duration,
    /// Factor applied to the wait after each further failure
    pub multiplier: f64,
    /// Upper bound on any single wait
    #[serde(default = "default_max_delay")]
    pub max_delay: Duration,
}

/// Default ceiling for a single backoff wait.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

fn default_max_delay() -> Duration {
    DEFAULT_MAX_DELAY
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Build a validated policy with the default delay ceiling.
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Result<Self> {
        let policy = Self {
            max_attempts,
            base_delay,
            multiplier,
            max_delay: DEFAULT_MAX_DELAY,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check that the multiplier is a finite, positive number.
    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "Retry multiplier must be finite and positive, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }

    /// A policy that makes a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Wait before retry number `retry` (0 = the first retry).
    ///
    /// Saturates at `max_delay`, including when the product overflows.
    pub fn delay_for(&self, retry: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let factor = self.multiplier.max(1.0).powf(f64::from(retry));
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Only errors where [`Error::is_transient`] holds are retried. The closure
    /// receives the 1-based attempt number.
    pub fn run<T, F>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.delay_for(attempt - 1);
                    tracing::warn!(
                        "Attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt,
                        attempts,
                        e,
                        delay
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Retries transient failures of the wrapped provider.
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: QuoteProvider> RetryingProvider<P> {
    /// Wrap `inner` with `policy`.
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The retry policy in effect.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: QuoteProvider> QuoteProvider for RetryingProvider<P> {
    fn id(&self) -> &'static str {
        self.inner.id()
    }

    fn fetch_history(&self, symbol: &str) -> Result<PriceSeries> {
        self.policy
            .run(|_| self.inner.fetch_history(symbol))
            .map_err(|e| match e {
                Error::QuoteUnavailable(msg) => Error::QuoteUnavailable(format!(
                    "{} (after {} attempts via {})",
                    msg,
                    self.policy.max_attempts.max(1),
                    self.inner.id()
                )),
                other => other,
            })
    }
}
