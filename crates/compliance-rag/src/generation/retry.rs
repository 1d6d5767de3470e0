//! Retry policy for the generation backend

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};

/// Exponential backoff over transient generation failures
///
/// Attempt `n` (zero-based) that fails transiently waits
/// `backoff_base * factor^n` before the next attempt. Permanent failures are
/// returned immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retry_count: u32,
    /// Delay before the first retry
    pub backoff_base: Duration,
    /// Multiplier applied to the delay after each retry
    pub factor: u32,
}

impl RetryPolicy {
    pub fn new(retry_count: u32, backoff_base: Duration) -> Self {
        Self {
            retry_count,
            backoff_base,
            factor: 2,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(config.retry_count, config.retry_backoff_base())
    }

    /// Total attempts including the first
    pub fn max_attempts(&self) -> u32 {
        self.retry_count + 1
    }

    /// Delay before retry number `retry` (zero-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff_base
            .saturating_mul(self.factor.saturating_pow(retry))
    }

    /// Run `operation` until it succeeds, fails permanently, or retries run out
    ///
    /// Exhausted retries surface as `Error::GenerationUnavailable` carrying
    /// the attempt count and the last transient cause.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts() {
                        return Err(Error::GenerationUnavailable {
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }

                    let delay = self.delay_for(attempt - 1);
                    tracing::warn!(
                        "Generation failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt,
                        self.max_attempts(),
                        delay,
                        e
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}
