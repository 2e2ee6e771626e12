/*!
 * Retry with exponential backoff for speech backends.
 *
 * Attempts run 1..=max_attempts; between attempts the task sleeps
 * `base_delay * 2^(attempt-1)`. Non-transient errors stop immediately.
 * The sleep only suspends the calling task.
 */

use log::{error, warn};
use std::future::Future;
use std::time::Duration;

use crate::app_config::SynthesisConfig;
use crate::errors::{ProviderError, SynthesisError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts, base_delay }
    }

    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self::new(config.retry_count, Duration::from_millis(config.retry_backoff_ms))
    }

    /// Sleep after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Run `operation` until it succeeds, fails terminally or runs out of attempts
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, SynthesisError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => {
                    error!("{}: {} (not retried)", label, e);
                    return Err(SynthesisError::Rejected(e));
                }
                Err(e) if attempt >= max_attempts => {
                    error!("{}: {} - attempt {}/{}", label, e, attempt, max_attempts);
                    return Err(SynthesisError::Exhausted { attempts: attempt, last: e });
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{}: {} - attempt {}/{}, retrying in {:?}",
                        label, e, attempt, max_attempts, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
