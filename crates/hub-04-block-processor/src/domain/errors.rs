//! Block processor and daemon errors.

use hub_01_codec::CodecError;
use hub_02_storage::StorageError;
use hub_03_claimtrie::ClaimTrieError;
use shared_types::{hash_to_hex_str, BlockHash, Height, Outpoint};
use thiserror::Error;

/// Errors from the consensus daemon client.
///
/// Connection problems, timeouts, a warming-up daemon and a full work
/// queue are retried inside the client and never surface here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DaemonError {
    /// The daemon answered with a JSON-RPC error object.
    #[error("daemon error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The daemon answered with something that is not the expected shape.
    #[error("malformed daemon response to {method}: {detail}")]
    Malformed { method: String, detail: String },

    /// A non-JSON body that does not mean "try again".
    #[error("daemon HTTP error: {0}")]
    Http(String),

    #[error("no daemon URL configured")]
    NoUrl,
}

impl DaemonError {
    pub(crate) fn malformed(method: &str, detail: impl Into<String>) -> Self {
        Self::Malformed {
            method: method.to_string(),
            detail: detail.into(),
        }
    }
}

/// Errors from block ingestion.
#[derive(Debug, Error)]
pub enum BlockProcessorError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("claim trie error: {0}")]
    ClaimTrie(#[from] ClaimTrieError),

    #[error("Cannot decode block at height {height}: {source}")]
    Codec {
        height: Height,
        #[source]
        source: CodecError,
    },

    #[error("daemon error: {0}")]
    Daemon(#[from] DaemonError),

    /// The block does not extend the local tip.
    #[error("Block at height {height} does not extend tip {}", hash_to_hex_str(.tip))]
    NotOnTip { height: Height, tip: BlockHash },

    /// The block spends an output that is not unspent.
    #[error("Block at height {height} spends unknown output {outpoint}")]
    MissingInput { height: Height, outpoint: Outpoint },

    /// Rewind deeper than the undo window. Needs a resync.
    #[error("Reorg of {depth} blocks below height {tip} exceeds the limit of {limit}")]
    ReorgLimitExceeded { tip: Height, depth: u32, limit: u32 },

    /// Stored state contradicts itself.
    #[error("Integrity violation at height {height}: {detail}")]
    Integrity { height: Height, detail: String },
}

impl BlockProcessorError {
    /// Errors that retrying the same block cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ReorgLimitExceeded { .. }
                | Self::Integrity { .. }
                | Self::MissingInput { .. }
                | Self::ClaimTrie(ClaimTrieError::Integrity { .. })
        )
    }
}
