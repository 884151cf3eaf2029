//! Resolution Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, matching the rest of the workspace.

use derive_more::{Display, Error};
use hubsync_client::error::{Error as ClientError, ErrorKind as ClientErrorKind};

/// A resolution error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for resolution operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The hub didn't answer in time. Retrying is up to the caller.
    #[display("addon hub timed out")]
    Timeout,
    /// The hub is considered down; no request was made.
    #[display("addon hub unavailable (circuit open)")]
    CircuitOpen,
    /// Any other transport-level failure (network, server error, bad response).
    #[display("addon hub request failed")]
    Remote,
    /// The catalog entry no longer exists upstream.
    #[display("addon {_0} no longer exists upstream")]
    SourceRemoved(#[error(not(source))] String),
    /// The identifier can't possibly refer to a catalog entry.
    #[display("malformed addon identifier: {_0:?}")]
    MalformedInput(#[error(not(source))] String),
    /// The hub returned the catalog entry, but in a shape that can't be used.
    #[display("addon {_0} has an unreadable catalog entry")]
    InvalidEntry(#[error(not(source))] String),
    /// The external folder scanner failed; the whole pass is abandoned.
    #[display("folder scan failed")]
    Scanner,
    /// A matched addon could not be turned into a resolved addon.
    #[display("could not resolve addon {_0}")]
    Unresolvable(#[error(not(source))] String),
}
impl From<&ClientErrorKind> for ErrorKind {
    fn from(kind: &ClientErrorKind) -> Self {
        match kind {
            ClientErrorKind::Timeout(_) => Self::Timeout,
            ClientErrorKind::CircuitOpen(_) => Self::CircuitOpen,
            _ => Self::Remote,
        }
    }
}
impl ErrorKind {
    /// Convert a client failure into a resolution error, keeping the client's
    /// error as a child in the error tree.
    #[track_caller]
    pub fn remote(kind: ClientErrorKind) -> Error {
        let ours = ErrorKind::from(&kind);
        exn::Exn::from(kind).raise(ours)
    }

    /// Like [`remote`](Self::remote), for a client error that still carries
    /// its own error tree.
    #[track_caller]
    pub fn from_client(err: ClientError) -> Error {
        let ours = ErrorKind::from(&*err);
        err.raise(ours)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Remote)
    }
}
