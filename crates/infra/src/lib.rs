//! # MediSync Infrastructure
//!
//! I/O side of the MediSync API client.
//!
//! This crate contains:
//! - Endpoint resolution and reachability probing
//! - The `reqwest` transport and the authenticated API client
//! - Bearer token attachment, 401 refresh and logout
//! - Session storage (memory and JSON file)
//! - Configuration loading and tracing bootstrap
//!
//! ## Architecture
//! - Builds on the platform model, error classifier, retry executor and
//!   operation queue of `medisync-common`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod endpoint;
pub mod http;
pub mod logging;
pub mod platform;
pub mod storage;

// Re-export commonly used items
pub use api::{ApiClient, ApiClientBuilder};
pub use bootstrap::MediSync;
pub use config::{ClientConfig, ConfigError};
pub use endpoint::{ActiveBaseUrl, EndpointResolver};
pub use http::{ApiRequest, HttpError, RawResponse, ReqwestTransport, Transport};
pub use logging::init_tracing;
pub use storage::{FileStore, MemoryStore, SessionStore};
