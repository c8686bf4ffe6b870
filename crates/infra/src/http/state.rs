use std::fmt;

use tracing::trace;

/// Lifecycle of one logical request, re-issues included.
///
/// ```text
/// Initial -> Sent -> Success
///                  | FailedNon401
///                  | Failed401Untried -> Refreshing -> RetriedOnce -> Sent -> ...
///                                                  | RefreshFailed -> LoggedOut
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Initial,
    Sent,
    Success,
    FailedNon401,
    Failed401Untried,
    Refreshing,
    RetriedOnce,
    /// Failed after the post-refresh re-issue.
    Failed,
    RefreshFailed,
    LoggedOut,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::FailedNon401 | Self::Failed | Self::LoggedOut)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initial => "INITIAL",
            Self::Sent => "SENT",
            Self::Success => "SUCCESS",
            Self::FailedNon401 => "FAILED_NON_401",
            Self::Failed401Untried => "FAILED_401_UNTRIED",
            Self::Refreshing => "REFRESHING",
            Self::RetriedOnce => "RETRIED_ONCE",
            Self::Failed => "FAILED",
            Self::RefreshFailed => "REFRESH_FAILED",
            Self::LoggedOut => "LOGGED_OUT",
        };
        f.write_str(name)
    }
}

/// Ordered record of the states one request went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTrace {
    states: Vec<RequestState>,
}

impl Default for RequestTrace {
    fn default() -> Self {
        Self { states: vec![RequestState::Initial] }
    }
}

impl RequestTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, state: RequestState) {
        trace!(%state, "request state");
        self.states.push(state);
    }

    pub fn states(&self) -> &[RequestState] {
        &self.states
    }

    pub fn last(&self) -> RequestState {
        self.states.last().copied().unwrap_or(RequestState::Initial)
    }

    pub fn contains(&self, state: RequestState) -> bool {
        self.states.contains(&state)
    }

    /// Number of times the request went out.
    pub fn sends(&self) -> usize {
        self.states.iter().filter(|s| **s == RequestState::Sent).count()
    }
}
