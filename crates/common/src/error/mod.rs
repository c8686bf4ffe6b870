//! Network error taxonomy and the deterministic failure classifier.
//!
//! Every failed call made by the client ends up as a [`NetworkError`]: the
//! transport describes what went wrong as a [`Failure`], and [`classify`]
//! maps it onto one of six kinds together with a retryability verdict.
//!
//! | condition                                  | kind         | retryable        |
//! |--------------------------------------------|--------------|------------------|
//! | HTTP 400                                   | `validation` | no               |
//! | HTTP 401                                   | `auth`       | yes (refresh)    |
//! | HTTP 403                                   | `auth`       | no               |
//! | HTTP 404                                   | `server`     | no               |
//! | HTTP 408, 504                              | `timeout`    | yes              |
//! | HTTP 429                                   | `server`     | yes              |
//! | HTTP 500, 502, 503                         | `server`     | yes              |
//! | any other status                           | `server`     | iff status ≥ 500 |
//! | transport message with "network"/"failed to fetch" | `network` | yes      |
//! | transport message with "timeout"           | `timeout`    | yes              |
//! | anything else                              | `unknown`    | no               |
//!
//! Classification never fails: malformed or missing input degrades to
//! `unknown`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Category of a classified network failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkErrorKind {
    /// Connection could not be established or was dropped.
    Network,
    /// The request or gateway timed out.
    Timeout,
    /// Credentials missing, expired or insufficient.
    Auth,
    /// The server rejected the request payload.
    Validation,
    /// The server failed or the resource is missing.
    Server,
    /// Anything the classifier does not recognise.
    Unknown,
}

impl NetworkErrorKind {
    /// Stable lowercase label for logs and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Auth => "auth",
            Self::Validation => "validation",
            Self::Server => "server",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Code attached to a classified error: an HTTP status or a symbolic code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    /// HTTP status code.
    Status(u16),
    /// Symbolic error code reported by a transport.
    Named(String),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "{status}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A classified failure of one network call.
///
/// Built once by the classifier and never mutated afterwards; the fields are
/// only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct NetworkError {
    kind: NetworkErrorKind,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<ErrorCode>,
    retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl NetworkError {
    /// Create a classified error without code or details.
    pub fn new(kind: NetworkErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self { kind, message: message.into(), code: None, retryable, details: None }
    }

    /// Attach a code while building the error.
    #[must_use]
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a structured payload while building the error.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Fallback used when a retry loop ends without ever recording an error.
    pub fn exhausted() -> Self {
        Self::new(NetworkErrorKind::Unknown, "Operation failed after retries", false)
    }

    pub fn kind(&self) -> NetworkErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&ErrorCode> {
        self.code.as_ref()
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self.code {
            Some(ErrorCode::Status(status)) => Some(status),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Whether the failure is transient and worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Severity used to pick a log level when the error surfaces.
    pub fn severity(&self) -> ErrorSeverity {
        match self.kind {
            NetworkErrorKind::Validation => ErrorSeverity::Info,
            NetworkErrorKind::Network | NetworkErrorKind::Timeout | NetworkErrorKind::Auth => {
                ErrorSeverity::Warning
            }
            NetworkErrorKind::Server if !self.retryable => ErrorSeverity::Warning,
            NetworkErrorKind::Server | NetworkErrorKind::Unknown => ErrorSeverity::Error,
        }
    }

    /// Text suitable for showing to a user, optionally prefixed with the
    /// operation that failed ("Save appointment: Access denied").
    pub fn user_message(&self, context: Option<&str>) -> String {
        match context {
            Some(context) if !context.is_empty() => format!("{context}: {}", self.message),
            _ => self.message.clone(),
        }
    }
}

/// Transport-neutral description of a failed call, the classifier's input.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// The server answered with a non-success status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Decoded JSON body, when the server sent one.
        body: Option<Value>,
    },
    /// The request never produced a response (refused, DNS, timeout...).
    Transport {
        /// Transport-level error message.
        message: String,
    },
    /// Any other failure raised by the operation itself.
    Other {
        /// Description of the failure.
        message: String,
    },
}

impl Failure {
    pub fn status(status: u16, body: Option<Value>) -> Self {
        Self::Status { status, body }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other { message: message.into() }
    }
}

/// Anything that can be turned into a classified [`NetworkError`].
///
/// The retry executor accepts any error type implementing this trait.
pub trait Classify {
    /// Classify this failure. Must not panic.
    fn classify(&self) -> NetworkError;
}

impl Classify for Failure {
    fn classify(&self) -> NetworkError {
        classify(Some(self))
    }
}

impl Classify for NetworkError {
    fn classify(&self) -> NetworkError {
        self.clone()
    }
}

/// Map a failed call onto its [`NetworkError`].
///
/// `None` stands for a missing or unusable error value and yields a
/// non-retryable `unknown` error.
pub fn classify(failure: Option<&Failure>) -> NetworkError {
    match failure {
        Some(Failure::Status { status, body }) => classify_status(*status, body.as_ref()),
        Some(Failure::Transport { message }) => classify_message(message),
        Some(Failure::Other { message }) => {
            NetworkError::new(NetworkErrorKind::Unknown, message.clone(), false)
        }
        None => NetworkError::new(NetworkErrorKind::Unknown, "An unexpected error occurred", false),
    }
}

fn classify_status(status: u16, body: Option<&Value>) -> NetworkError {
    let code = ErrorCode::Status(status);
    let error = match status {
        400 => {
            let message = body_message(body).unwrap_or_else(|| "Invalid request data".into());
            let error = NetworkError::new(NetworkErrorKind::Validation, message, false);
            return match body {
                Some(details) => error.with_code(code).with_details(details.clone()),
                None => error.with_code(code),
            };
        }
        401 => NetworkError::new(NetworkErrorKind::Auth, "Authentication required", true),
        403 => NetworkError::new(NetworkErrorKind::Auth, "Access denied", false),
        404 => NetworkError::new(NetworkErrorKind::Server, "Resource not found", false),
        408 | 504 => NetworkError::new(NetworkErrorKind::Timeout, "Request timeout", true),
        429 => NetworkError::new(
            NetworkErrorKind::Server,
            "Too many requests. Please try again later.",
            true,
        ),
        500 | 502 | 503 => NetworkError::new(
            NetworkErrorKind::Server,
            "Server error. Please try again later.",
            true,
        ),
        other => {
            let message = body_message(body).unwrap_or_else(|| "Server error".into());
            NetworkError::new(NetworkErrorKind::Server, message, other >= 500)
        }
    };
    error.with_code(code)
}

fn classify_message(message: &str) -> NetworkError {
    let lower = message.to_lowercase();

    if lower.contains("network") || lower.contains("failed to fetch") {
        return NetworkError::new(
            NetworkErrorKind::Network,
            "Network connection failed. Please check your internet connection.",
            true,
        );
    }

    if lower.contains("timeout") || lower.contains("timed out") {
        return NetworkError::new(
            NetworkErrorKind::Timeout,
            "Request timed out. Please try again.",
            true,
        );
    }

    let message = if message.trim().is_empty() { "An unexpected error occurred" } else { message };
    NetworkError::new(NetworkErrorKind::Unknown, message, false)
}

/// `detail` wins over `message`, matching the API's error envelope.
fn body_message(body: Option<&Value>) -> Option<String> {
    let body = body?;
    ["detail", "message"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .map(str::to_owned)
}
