//! API origin selection
//!
//! The client always talks to exactly one origin, held in [`ActiveBaseUrl`].
//! [`EndpointResolver`] picks it synchronously at boot and may later switch it
//! after probing the candidate origins for the current platform.

mod active;
mod candidates;
mod probe;
mod resolver;

pub use active::ActiveBaseUrl;
pub use candidates::{
    by_priority, default_mobile_candidates, normalize_origin, EndpointCandidate,
    FALLBACK_BASE_URL,
};
pub use probe::{ConnectivityTestResult, ProbeOutcome};
pub use resolver::{EndpointResolver, NetworkInfo};
