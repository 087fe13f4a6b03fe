//! Storage error types.

use shared_types::Height;
use thiserror::Error;

/// Errors raised by a [`KeyValueStore`](crate::ports::outbound::KeyValueStore) backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },

    #[error("Key not found in KV store")]
    NotFound,
}

/// Errors surfaced by the hub database and the headers file.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    KeyValue(#[from] KVStoreError),

    #[error("Record encoding failed for {what}: {message}")]
    Serialization { what: &'static str, message: String },

    #[error("Malformed key under prefix {prefix:?}: {len} bytes")]
    MalformedKey { prefix: char, len: usize },

    #[error("No undo record for height {0}")]
    MissingUndo(Height),

    #[error("Block {height} does not follow the committed tip {tip:?}")]
    NonSequentialBlock { height: Height, tip: Option<Height> },

    #[error("Header must be {expected} bytes, got {actual}")]
    InvalidHeader { expected: usize, actual: usize },

    #[error("Headers file holds {count} headers, cannot read height {height}")]
    HeaderOutOfRange { height: Height, count: u32 },

    #[error("Headers file I/O error: {0}")]
    HeadersIo(#[from] std::io::Error),

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Errors from locking the data directory.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Failed to create lock file: {0}")]
    CreateFailed(std::io::Error),

    #[error(
        "Data directory already in use ({}){}",
        .path.display(),
        .pid.map(|p| format!(", held by process {p}")).unwrap_or_default()
    )]
    AlreadyLocked {
        pid: Option<u32>,
        path: std::path::PathBuf,
    },

    #[error("Failed to write PID to lock file: {0}")]
    WriteFailed(std::io::Error),
}

pub(crate) fn encode_error(what: &'static str, err: bincode::Error) -> StorageError {
    StorageError::Serialization {
        what,
        message: err.to_string(),
    }
}
