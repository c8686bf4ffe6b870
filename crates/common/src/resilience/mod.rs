//! Resilience patterns for transient network failures
//!
//! - **Retry Executor**: runs an operation under a [`RetryConfig`], using the
//!   error classifier's retryability verdict and capped exponential backoff.
//!
//! Platform defaults come from [`RetryConfig::for_platform`]: the mobile
//! shell gets longer delays and more retries than the browser.

pub mod retry;

pub use retry::{
    execute_with_retry, AsyncOperationResult, Jitter, RetryConfig, RetryConfigBuilder,
    RetryConfigError, RetryPredicate,
};
