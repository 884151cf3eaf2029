//! Client Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, matching the rest of the workspace.

use derive_more::{Display, Error};
use std::time::Duration;

/// A client error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
/// `Clone` so that a single failed request can be reported to every caller
/// that was waiting on it.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request did not complete within the configured deadline.
    #[display("request timed out after {_0:?}")]
    Timeout(#[error(not(source))] Duration),
    /// The endpoint's breaker is open; no request was attempted.
    #[display("circuit open for endpoint {_0}")]
    CircuitOpen(#[error(not(source))] String),
    /// Connection-level failure (DNS, TLS, reset, ...).
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The remote answered with a non-success status code.
    #[display("unexpected HTTP status {_0}")]
    Status(#[error(not(source))] u16),
    /// The remote answered, but not with what we expected.
    #[display("malformed response body")]
    MalformedResponse,
    /// The request could not be built (bad URL, unserializable body).
    #[display("invalid request: {_0}")]
    InvalidRequest(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Status(code) => *code >= 500 || *code == 429,
            Self::CircuitOpen(_) | Self::MalformedResponse | Self::InvalidRequest(_) => false,
        }
    }
}
