//! HTTP plumbing
//!
//! - [`Transport`]: one request in, one response out, no policy
//! - [`ReqwestTransport`]: the production transport
//! - [`RequestInterceptor`] / [`ResponseInterceptor`]: explicit ordered hooks
//!   the API client runs around every send
//! - [`RequestTrace`]: per-request state machine record

pub mod client;
pub mod errors;
pub mod interceptor;
pub mod request;
pub mod state;

pub use client::{ReqwestTransport, ReqwestTransportBuilder, Transport};
pub use errors::HttpError;
pub use interceptor::{Recovery, RequestInterceptor, ResponseInterceptor};
pub use request::{ApiRequest, PreparedRequest, RawResponse};
pub use state::{RequestState, RequestTrace};
