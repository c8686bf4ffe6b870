//! Transport-agnostic core of the MediSync API client.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: platform model, error taxonomy and classifier
//! - `runtime`: retry executor and operation queue (tokio based)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
pub mod platform;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;
#[cfg(feature = "runtime")]
pub mod sync;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{classify, Classify, ErrorCode, ErrorSeverity, Failure, NetworkError, NetworkErrorKind};
#[cfg(feature = "foundation")]
pub use platform::{PlatformDetector, PlatformInfo, PlatformKind, StaticPlatformDetector, TimeoutConfig};
#[cfg(feature = "runtime")]
pub use resilience::{
    execute_with_retry, AsyncOperationResult, Jitter, RetryConfig, RetryConfigBuilder,
    RetryConfigError,
};
#[cfg(feature = "runtime")]
pub use sync::{execute_mobile_safe, OperationQueue, QueueError, QueueResult};
