use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Result of one reachability probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// 2xx, or a status that still proves a server is answering.
    Reachable { status: u16 },
    /// 401/403/405 on an auth-gated probe path.
    Protected { status: u16 },
    /// 401/403/405 on a path that should have been open.
    Rejected { status: u16 },
    /// 404: right host, wrong service.
    WrongService,
    ServerError { status: u16 },
    /// Refused, DNS failure, timeout.
    Unreachable { reason: String },
}

impl ProbeOutcome {
    /// Classify an HTTP status received from the probe path.
    pub fn from_status(status: u16, auth_gated: bool) -> Self {
        match status {
            200..=299 => Self::Reachable { status },
            401 | 403 | 405 if auth_gated => Self::Protected { status },
            401 | 403 | 405 => Self::Rejected { status },
            404 => Self::WrongService,
            500.. => Self::ServerError { status },
            _ => Self::Reachable { status },
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable { .. } | Self::Protected { .. })
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reachable { status } => write!(f, "reachable ({status})"),
            Self::Protected { status } => write!(f, "reachable but protected ({status})"),
            Self::Rejected { status } => write!(f, "rejected ({status})"),
            Self::WrongService => f.write_str("wrong service (404)"),
            Self::ServerError { status } => write!(f, "server error ({status})"),
            Self::Unreachable { reason } => write!(f, "unreachable: {reason}"),
        }
    }
}

/// Diagnostic result of testing one origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityTestResult {
    pub success: bool,
    pub endpoint: String,
    pub outcome: ProbeOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "duration_ms")]
    pub response_time: Duration,
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }
}
