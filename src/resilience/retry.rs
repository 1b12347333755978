use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{SkillforgeError, SkillforgeResult};
use crate::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS};

/// Waiting capability used for backoff pauses.
///
/// Production clients use [`TokioSleeper`]; tests substitute a recorder so
/// the delay schedule is observable without real time passing.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Pause cooperatively for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Sleeper over the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; later retries double it each time
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
        }
    }
}

/// Runs operations under an exponential backoff budget.
pub struct RetryPolicy {
    config: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryPolicy {
    /// Create a policy with the given configuration and the tokio timer.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the waiting capability.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.config.base_delay * 2u32.saturating_pow(attempt)
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    ///
    /// A failure that leaves budget waits `base_delay * 2^attempt_index` and
    /// retries. The failure that spends the budget comes back wrapped in
    /// [`SkillforgeError::Exhausted`] with no trailing wait.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> SkillforgeResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = SkillforgeResult<T>> + Send,
        T: Send,
    {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(SkillforgeError::Exhausted {
                            attempts,
                            source: Box::new(err),
                        });
                    }
                    let delay = self.backoff_delay(attempt - 1);
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    self.sleeper.sleep(delay).await;
                }
            }
        }
    }
}
