//! MediSync API client
//!
//! [`ApiClient`] is what application code talks to: JSON helpers for the
//! usual verbs, raw [`send`](ApiClient::send), retry-wrapped calls and
//! logout. Authentication, the active origin and native-shell serialization
//! are handled underneath.

pub mod client;

pub use client::{ApiClient, ApiClientBuilder};
