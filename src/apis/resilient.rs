//! Single retry wrapper for every external call
//!
//! Errors are classified by [`ApiError::retry_class`]. Retryable failures
//! back off exponentially (`base * 2^attempt`, clamped to `[min, max]`) unless
//! the server supplied a delay, which is honored up to `max`.

use crate::config::RetryConfig;
use crate::errors::{ApiError, RetryClass};
use crate::logger::{self, LogTag};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        let min_delay = Duration::from_millis(config.min_delay_ms);
        let max_delay = Duration::from_millis(config.max_delay_ms).max(min_delay);
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            min_delay,
            max_delay,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32, server_delay: Option<Duration>) -> Duration {
        if let Some(delay) = server_delay {
            return delay.min(self.max_delay);
        }
        let multiplier = 2u32.saturating_pow(attempt.min(16));
        self.base_delay
            .saturating_mul(multiplier)
            .max(self.min_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Run `op` up to `1 + max_retries` times, sleeping between retryable failures
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    logger::debug(
                        LogTag::Api,
                        &format!("{} succeeded after {} retries", label, attempt),
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                let server_delay = match err.retry_class() {
                    RetryClass::Fatal => {
                        logger::debug(LogTag::Api, &format!("{} failed: {}", label, err));
                        return Err(err);
                    }
                    RetryClass::Retry(server_delay) => server_delay,
                };

                if attempt >= policy.max_retries {
                    logger::warning(
                        LogTag::Api,
                        &format!(
                            "{} giving up after {} attempts: {}",
                            label,
                            attempt + 1,
                            err
                        ),
                    );
                    return Err(err);
                }

                let delay = policy.delay_for(attempt, server_delay);
                logger::warning(
                    LogTag::Api,
                    &format!(
                        "{} attempt {}/{} failed ({}), retrying in {}ms",
                        label,
                        attempt + 1,
                        policy.max_retries + 1,
                        err,
                        delay.as_millis()
                    ),
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
