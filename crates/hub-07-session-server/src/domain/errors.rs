//! Session errors with their JSON-RPC codes.
//!
//! An [`RpcError`] answers one request and leaves the connection open.
//! A [`SessionError`] ends the connection.

use hub_02_storage::StorageError;
use hub_04_block_processor::DaemonError;
use hub_06_query_executor::QueryError;
use thiserror::Error;

pub mod codes {
    // JSON-RPC 2.0
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_ARGS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // Application
    pub const BAD_REQUEST: i32 = 1;
    pub const DAEMON_ERROR: i32 = 2;
    pub const QUERY_TIMEOUT: i32 = -32000;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({code})")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn parse_error(details: impl std::fmt::Display) -> Self {
        Self::new(codes::PARSE_ERROR, format!("invalid JSON: {details}"))
    }

    pub fn invalid_request(details: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST, details)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("unknown method \"{method}\""))
    }

    pub fn invalid_args(details: impl Into<String>) -> Self {
        Self::new(codes::INVALID_ARGS, details)
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, details)
    }

    pub fn bad_request(details: impl Into<String>) -> Self {
        Self::new(codes::BAD_REQUEST, details)
    }

    pub fn daemon(err: &DaemonError) -> Self {
        Self::new(codes::DAEMON_ERROR, format!("daemon error: {err}"))
    }
}

impl From<QueryError> for RpcError {
    fn from(err: QueryError) -> Self {
        match &err {
            QueryError::Timeout { .. } => Self::new(codes::QUERY_TIMEOUT, err.to_string()),
            _ if err.is_bad_request() => Self::bad_request(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<DaemonError> for RpcError {
    fn from(err: DaemonError) -> Self {
        Self::daemon(&err)
    }
}

impl From<StorageError> for RpcError {
    fn from(err: StorageError) -> Self {
        Self::internal(err.to_string())
    }
}

/// Why a connection ended.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message of {size} bytes exceeds the {limit} byte limit")]
    OversizedMessage { size: usize, limit: usize },

    #[error("Session idle for longer than {secs} s")]
    Idle { secs: u64 },

    #[error("Outgoing queue full")]
    Backlogged,

    #[error("Session closed by server")]
    Closed,
}
