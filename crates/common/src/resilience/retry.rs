//! Retry executor with capped exponential backoff
//!
//! Runs an arbitrary async operation up to `max_retries + 1` times. Each
//! failure is classified into a [`NetworkError`]; the loop stops as soon as
//! the attempt budget is spent or the retry predicate rejects the error.
//!
//! The delay before retry `n` (1-based) is
//! `min(base_delay * backoff_multiplier^(n-1), max_delay)`, deterministic
//! unless jitter is enabled. Jitter never pushes a delay above `max_delay`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::error::{Classify, NetworkError};
use crate::platform::{PlatformInfo, TimeoutConfig};

/// Decides whether a classified error deserves another attempt.
pub type RetryPredicate = Arc<dyn Fn(&NetworkError) -> bool + Send + Sync>;

/// Errors raised while building a [`RetryConfig`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryConfigError {
    /// The retry configuration is invalid
    #[error("Invalid retry configuration: {message}")]
    InvalidConfiguration { message: String },
}

/// Jitter type for adding randomness to retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// No jitter, delays are fully deterministic
    #[default]
    None,
    /// Equal jitter: calculated_delay/2 to calculated_delay
    Equal,
}

impl Jitter {
    /// Apply jitter to the calculated delay
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            Jitter::None => delay,
            Jitter::Equal => {
                let half_ms = (delay.as_millis() / 2) as u64;
                if half_ms == 0 {
                    return delay;
                }
                let jitter_ms = rand::thread_rng().gen_range(0..=half_ms);
                Duration::from_millis(half_ms + jitter_ms).min(delay)
            }
        }
    }
}

/// Configuration for retry behavior
///
/// Immutable per invocation; build a new one to change behaviour.
#[derive(Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt (total attempts = `max_retries + 1`)
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub backoff_multiplier: f64,
    pub jitter: Jitter,
    retry_predicate: Option<RetryPredicate>,
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter", &self.jitter)
            .field("custom_predicate", &self.retry_predicate.is_some())
            .finish()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
            jitter: Jitter::None,
            retry_predicate: None,
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Platform defaults: the mobile shell gets more retries and longer delays.
    pub fn for_platform(platform: &PlatformInfo) -> Self {
        Self::from_timeouts(platform.timeout_config())
    }

    pub fn from_timeouts(timeouts: TimeoutConfig) -> Self {
        Self {
            max_retries: timeouts.max_retries,
            base_delay: timeouts.base_delay,
            max_delay: timeouts.max_delay,
            ..Self::default()
        }
    }

    /// Replace the retry predicate (defaults to [`NetworkError::is_retryable`]).
    #[must_use]
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&NetworkError) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Some(Arc::new(predicate));
        self
    }

    /// Keep the current predicate but never retry errors matching `exclude`.
    #[must_use]
    pub fn excluding<F>(mut self, exclude: F) -> Self
    where
        F: Fn(&NetworkError) -> bool + Send + Sync + 'static,
    {
        let base = self.retry_predicate.take();
        self.retry_predicate = Some(Arc::new(move |error: &NetworkError| {
            !exclude(error)
                && match &base {
                    Some(predicate) => predicate(error),
                    None => error.is_retryable(),
                }
        }));
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RetryConfigError> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(RetryConfigError::InvalidConfiguration {
                message: format!(
                    "backoff_multiplier must be a finite value >= 1.0, got {}",
                    self.backoff_multiplier
                ),
            });
        }

        if self.base_delay > self.max_delay {
            return Err(RetryConfigError::InvalidConfiguration {
                message: format!(
                    "base_delay ({:?}) must not exceed max_delay ({:?})",
                    self.base_delay, self.max_delay
                ),
            });
        }

        Ok(())
    }

    /// Backoff delay before retry number `attempt` (1-based), without jitter.
    ///
    /// Non-decreasing in `attempt` and never above `max_delay`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let max_ms = self.max_delay.as_millis() as f64;
        let delay_ms = self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);

        if !delay_ms.is_finite() || delay_ms >= max_ms {
            return self.max_delay;
        }
        Duration::from_millis(delay_ms as u64)
    }

    /// Whether the classified error should be retried under this config.
    pub fn should_retry(&self, error: &NetworkError) -> bool {
        match &self.retry_predicate {
            Some(predicate) => predicate(error),
            None => error.is_retryable(),
        }
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        self.jitter.apply(self.calculate_delay(attempt)).min(self.max_delay)
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.backoff_multiplier = multiplier;
        self
    }

    pub fn no_jitter(mut self) -> Self {
        self.config.jitter = Jitter::None;
        self
    }

    pub fn equal_jitter(mut self) -> Self {
        self.config.jitter = Jitter::Equal;
        self
    }

    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&NetworkError) -> bool + Send + Sync + 'static,
    {
        self.config.retry_predicate = Some(Arc::new(predicate));
        self
    }

    pub fn build(self) -> Result<RetryConfig, RetryConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Terminal result of one retry-wrapped operation.
///
/// Holds either data or an error, never both and never neither.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncOperationResult<T> {
    outcome: Result<T, NetworkError>,
    retry_count: u32,
}

impl<T> AsyncOperationResult<T> {
    pub fn succeeded(data: T, retry_count: u32) -> Self {
        Self { outcome: Ok(data), retry_count }
    }

    pub fn failed(error: NetworkError, retry_count: u32) -> Self {
        Self { outcome: Err(error), retry_count }
    }

    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn data(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&NetworkError> {
        self.outcome.as_ref().err()
    }

    /// Retries performed before the result was reached.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn into_result(self) -> Result<T, NetworkError> {
        self.outcome
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> AsyncOperationResult<U> {
        AsyncOperationResult { outcome: self.outcome.map(f), retry_count: self.retry_count }
    }
}

/// Execute an operation with retry logic.
///
/// Never returns a raw error: every failure is classified before it is
/// surfaced in the result.
///
/// `retry_count` on failure is the number of retries actually made: an
/// exhausted budget reports `max_retries`, an error the predicate rejects
/// reports `attempt - 1`. Callers that only look at `success()` see no
/// difference from a flat `max_retries` report.
#[instrument(skip(operation, config), fields(max_retries = config.max_retries))]
pub async fn execute_with_retry<F, Fut, T, E>(
    mut operation: F,
    config: &RetryConfig,
) -> AsyncOperationResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify,
{
    let total_attempts = config.max_retries.saturating_add(1);
    let mut last_error: Option<NetworkError> = None;

    for attempt in 1..=total_attempts {
        debug!("Executing operation (attempt {}/{})", attempt, total_attempts);

        match operation().await {
            Ok(data) => {
                if attempt > 1 {
                    debug!("Operation succeeded after {} retries", attempt - 1);
                }
                return AsyncOperationResult::succeeded(data, attempt - 1);
            }
            Err(err) => {
                let error = err.classify();

                if attempt >= total_attempts {
                    warn!(
                        attempts = attempt,
                        kind = %error.kind(),
                        "All retry attempts exhausted: {}",
                        error.message()
                    );
                    return AsyncOperationResult::failed(error, config.max_retries);
                }

                if !config.should_retry(&error) {
                    debug!(kind = %error.kind(), "Retry policy determined not to retry");
                    return AsyncOperationResult::failed(error, attempt - 1);
                }

                let delay = config.next_delay(attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    kind = %error.kind(),
                    "Attempt failed, retrying: {}",
                    error.message()
                );
                last_error = Some(error);
                tokio::time::sleep(delay).await;
            }
        }
    }

    AsyncOperationResult::failed(last_error.unwrap_or_else(NetworkError::exhausted), config.max_retries)
}
