//! Retry with exponential backoff for transient external-call failures

use crate::config::RetryConfig;
use crate::error::Result;
use std::future::Future;
use std::time::Duration;

/// Backoff schedule derived from [`RetryConfig`]
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms.max(config.initial_backoff_ms)),
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `attempt` (0-based), doubling up to the cap
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// retry budget is spent.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        "{} failed ({}). Retrying in {:?} (attempt {}/{})",
                        what,
                        e,
                        delay,
                        attempt + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
