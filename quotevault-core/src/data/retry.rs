//! Retry policy: exponential backoff over a fallible call.

use super::pacing::Sleeper;
use super::provider::{ErrorKind, FetchError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Exponential backoff settings for provider calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// Error classes worth retrying. `NotFound` is never retried, even if listed.
    pub retry_on: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 10_000,
            retry_on: vec![ErrorKind::RateLimited, ErrorKind::Transient],
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (1-based): `base * 2^(retry-1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        let ms = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(ms)
    }

    pub fn is_retryable(&self, err: &FetchError) -> bool {
        let kind = err.kind();
        kind != ErrorKind::NotFound && self.retry_on.contains(&kind)
    }

    /// Run `op` until it succeeds, fails terminally, or retries run out.
    ///
    /// `op` receives the 0-based attempt number. The final error is returned
    /// unchanged, so an exhausted rate limit stays `RateLimited`.
    pub fn run<T, F>(&self, sleeper: &dyn Sleeper, label: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut(u32) -> Result<T, FetchError>,
    {
        let mut attempt = 0u32;
        loop {
            match op(attempt) {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(call = label, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !self.is_retryable(&err) => return Err(err),
                Err(err) if attempt >= self.max_retries => {
                    warn!(call = label, attempts = attempt + 1, error = %err, "retries exhausted");
                    return Err(err);
                }
                Err(err) => {
                    attempt += 1;
                    let mut wait = self.delay_for(attempt);
                    if let Some(hint) = err.retry_after() {
                        wait = wait.max(hint);
                    }
                    warn!(
                        call = label,
                        retry = attempt,
                        of = self.max_retries,
                        wait_secs = wait.as_secs_f64(),
                        error = %err,
                        "retrying"
                    );
                    sleeper.sleep(wait);
                }
            }
        }
    }
}
