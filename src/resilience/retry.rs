//! Retry logic with exponential backoff for the Vertex AI client.
//!
//! The wait after attempt `n` is `min(max_delay, initial_delay * 2^(n-1))`.
//! Optional jitter only ever shortens a wait.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::error::InvokerError;

/// Default number of tries per logical call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default wait after the first failed attempt.
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);

/// Default upper bound on any single wait.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Errors that know whether another attempt is worthwhile.
pub trait Retryable {
    /// Returns true if the operation may succeed when tried again.
    fn is_retryable(&self) -> bool;
}

impl Retryable for InvokerError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of tries, including the first.
    pub max_attempts: u32,
    /// Wait after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single wait.
    pub max_delay: Duration,
    /// Fraction (0.0 to 1.0) by which a wait may be randomly shortened.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_BASE_BACKOFF,
            max_delay: DEFAULT_MAX_BACKOFF,
            jitter: 0.0,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration without jitter.
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            jitter: 0.0,
        }
    }

    /// Creates a configuration that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Creates a configuration for aggressive retries.
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: 0.2,
        }
    }

    /// Sets the jitter fraction, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Un-jittered wait after failed attempt `attempt` (1-based).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Executes operations with retry logic and exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Creates a new retry executor with the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Creates a retry executor with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Executes an operation with retry logic.
    ///
    /// # Behavior
    ///
    /// - Tries at most `max_attempts` times (at least once)
    /// - Retries only errors whose [`Retryable::is_retryable`] is true
    /// - Returns the first success, or the last error unchanged
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::info!("Operation succeeded on attempt {}", attempt);
                    }
                    return Ok(result);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let wait = self.delay_for_attempt(attempt);

                    tracing::warn!(
                        "Retryable error encountered (attempt {}/{}): {}. Waiting {:?} before retry.",
                        attempt,
                        max_attempts,
                        e,
                        wait
                    );

                    sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 1 {
                        tracing::error!(
                            "Operation failed after {} attempts: {}",
                            attempt,
                            e
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Wait after failed attempt `attempt`, with jitter applied.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.config.backoff_for_attempt(attempt);
        if self.config.jitter <= 0.0 {
            return delay;
        }

        let reduction = rand::thread_rng().gen_range(0.0..=self.config.jitter.min(1.0));
        delay.mul_f64(1.0 - reduction).min(self.config.max_delay)
    }

    /// Returns the retry configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}
