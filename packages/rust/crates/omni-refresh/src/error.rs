//! Error types for refresh orchestration.
//!
//! Two layers: `ProbeError` is what a status probe (or refresh requester)
//! reports about one remote call; `RefreshError` is what a job hands back
//! to its caller.

use std::time::Duration;

use thiserror::Error;

/// Errors reported by a `StatusProbe` or `RefreshRequester` call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Provider throttled the request.
    #[error("rate limited")]
    RateLimited,

    /// The request did not complete in time.
    #[error("request timeout")]
    Timeout,

    /// Provider-side failure (5xx class).
    #[error("server error (status {status}): {message}")]
    Server {
        /// HTTP-like status code.
        status: u16,
        /// Provider message.
        message: String,
    },

    /// No valid session.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Session existed but has expired.
    #[error("session expired")]
    SessionExpired,

    /// Request was rejected as malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Structured API error with provider code.
    #[error("{code}: {message}")]
    Api {
        /// Provider error code.
        code: String,
        /// Provider message.
        message: String,
        /// Status code, when the transport exposed one.
        status_code: Option<u16>,
    },

    /// Transport-level failure that carries no status.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ProbeError {
    /// Whether polling may continue after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited | Self::Timeout | Self::Server { .. } => true,
            Self::Api {
                status_code: Some(status),
                ..
            } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Whether the error means the session needs re-authentication.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated
                | Self::SessionExpired
                | Self::Api {
                    status_code: Some(401),
                    ..
                }
        )
    }
}

/// Errors returned by refresh jobs and the orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The status probe failed with a non-retryable error.
    #[error("failed to check refresh status: {0}")]
    Probe(#[from] ProbeError),

    /// The caller cancelled the job.
    #[error("refresh job was cancelled")]
    Cancelled,

    /// The wait deadline elapsed before every item completed.
    #[error("refresh timeout after {0:?}")]
    TimedOut(Duration),

    /// Job ended in `Failed` without a recorded probe error.
    #[error("refresh job failed")]
    Failed,

    /// The provider refused to start the refresh.
    #[error("refresh request was not accepted: {0}")]
    RequestRejected(String),

    /// No job registered under the given id.
    #[error("refresh job not found: {0}")]
    NotFound(String),
}

impl RefreshError {
    /// True for caller-initiated cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True when the wait deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

/// Result type for refresh operations.
pub type Result<T> = std::result::Result<T, RefreshError>;
