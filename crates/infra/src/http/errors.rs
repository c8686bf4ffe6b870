//! HTTP-layer error types
//!
//! Raw transport failures and non-success responses. Nothing here leaves the
//! crate unclassified: every variant implements [`Classify`], so the retry
//! executor and callers see a [`NetworkError`].

use std::time::Duration;

use medisync_common::error::{Classify, Failure, NetworkError};
use medisync_common::sync::QueueError;
use serde_json::Value;
use thiserror::Error;

/// HTTP operation errors
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// The server answered with a non-success status.
    #[error("{url} returned status {status}")]
    Status { status: u16, url: String, body: Option<Value> },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Failed to build HTTP client: {0}")]
    Build(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Operation queue failed: {0}")]
    Queue(#[from] QueueError),
}

impl HttpError {
    /// Status code of a `Status` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Decoded response body of a `Status` error.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Map a reqwest failure, keeping the timeout that was in force.
    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return Self::Timeout(timeout);
        }
        if err.is_connect() || err.is_request() {
            return Self::Network(err.to_string());
        }
        if err.is_decode() || err.is_body() {
            return Self::Decode(err.to_string());
        }
        if err.is_builder() {
            return Self::InvalidUrl(err.to_string());
        }
        Self::Request(err.to_string())
    }
}

impl Classify for HttpError {
    fn classify(&self) -> NetworkError {
        match self {
            Self::Status { status, body, .. } => Failure::status(*status, body.clone()).classify(),
            Self::Network(_) => Failure::transport("Network Error").classify(),
            Self::Timeout(timeout) => {
                Failure::transport(format!("timeout of {}ms exceeded", timeout.as_millis()))
                    .classify()
            }
            Self::Queue(err) => err.classify(),
            other => Failure::other(other.to_string()).classify(),
        }
    }
}
