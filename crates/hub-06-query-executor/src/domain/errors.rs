//! Query errors.
//!
//! [`QueryError`] fails a whole request and becomes a JSON-RPC error for the
//! requesting session only. [`UrlError`] fails one URL of a resolve batch and
//! is reported inside the result.

use hub_02_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("URL is empty")]
    Empty,

    #[error("Unsupported scheme in \"{0}\"")]
    Scheme(String),

    #[error("URL has too many path segments")]
    TooManySegments,

    #[error("Invalid name \"{0}\"")]
    InvalidName(String),

    #[error("Channel names must start with '@', got \"{0}\"")]
    NotAChannel(String),

    #[error("Stream names cannot start with '@', got \"{0}\"")]
    NotAStream(String),

    #[error("Invalid claim id \"{0}\"")]
    InvalidClaimId(String),

    #[error("Invalid sequence or rank \"{0}\"")]
    InvalidNumber(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Search query contains invalid argument: {0}")]
    UnknownConstraint(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidConstraint { key: String, reason: String },

    #[error("Query timed out after {ms} ms")]
    Timeout { ms: u64 },

    #[error("Query executor is shut down")]
    Closed,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal query error: {0}")]
    Internal(String),
}

impl QueryError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConstraint {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the client sent a bad request, as opposed to the server
    /// failing to answer it.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Self::UnknownConstraint(_) | Self::InvalidConstraint { .. }
        )
    }
}

impl From<StorageError> for QueryError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}
