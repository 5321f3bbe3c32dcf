//! Retry logic with configurable backoff
//!
//! The default options reproduce the resource manager's fixed wait between
//! throttled attempts; a multiplier above 1.0 and jitter turn it into an
//! exponential backoff capped at `max_interval`.

use crate::config::RetryConfig;
use crate::error::{AzvisorError, Result};
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryOptions {
    /// Total number of attempts, including the first one
    pub max_attempts: usize,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryOptions {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_interval: Duration::from_secs(config.wait_seconds),
            max_interval: Duration::from_secs(config.max_wait_seconds.max(config.wait_seconds)),
            multiplier: config.multiplier,
            jitter: config.jitter,
        }
    }
}

impl RetryOptions {
    /// Fixed wait between attempts
    pub fn fixed(max_attempts: usize, wait: Duration) -> Self {
        Self {
            max_attempts,
            initial_interval: wait,
            max_interval: wait,
            multiplier: 1.0,
            jitter: false,
        }
    }

    /// Exponential backoff with full jitter
    pub fn exponential(max_attempts: usize, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            initial_interval: initial,
            max_interval: max,
            multiplier: 2.0,
            jitter: true,
        }
    }

    /// Upper bound of the wait after the given failed attempt (1-based)
    pub fn base_delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let capped = secs.min(self.max_interval.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Wait to apply after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let millis = base.as_millis().min(u64::MAX as u128) as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
    }
}

/// Run `operation` until it succeeds, returns a non-retryable error, or the
/// attempts are exhausted. The attempt number (1-based) is passed in.
pub async fn retry_with_backoff<T, F, Fut, P>(
    mut operation: F,
    options: &RetryOptions,
    is_retryable: P,
) -> Result<T>
where
    F: FnMut(usize) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    P: Fn(&AzvisorError) -> bool,
{
    let attempts = options.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if !is_retryable(&error) {
                    return Err(error);
                }

                last_error = Some(error);
                if attempt < attempts {
                    sleep(options.delay_for(attempt)).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| AzvisorError::network("Retry failed with no error")))
}
