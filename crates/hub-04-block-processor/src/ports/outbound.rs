//! Driven ports: the consensus daemon.

use async_trait::async_trait;
use shared_types::{BlockHash, Height, TxHash};

use crate::domain::errors::DaemonError;

/// The consensus daemon as the hub uses it.
///
/// Every call except [`DaemonApi::broadcast_transaction`] is idempotent.
/// Implementations retry transient failures themselves; an `Err` means the
/// daemon gave a definite answer the caller has to handle.
#[async_trait]
pub trait DaemonApi: Send + Sync {
    /// Height of the daemon's best chain (`getblockcount`).
    async fn height(&self) -> Result<Height, DaemonError>;

    /// Height seen by the last successful [`DaemonApi::height`] call.
    fn cached_height(&self) -> Option<Height>;

    /// Hashes of `count` consecutive blocks starting at `first`.
    async fn block_hashes(&self, first: Height, count: u32) -> Result<Vec<BlockHash>, DaemonError>;

    /// Raw serialized blocks, in the order of `hashes`.
    async fn raw_blocks(&self, hashes: &[BlockHash]) -> Result<Vec<Vec<u8>>, DaemonError>;

    /// Hashes of every transaction in the daemon's mempool.
    async fn mempool_hashes(&self) -> Result<Vec<TxHash>, DaemonError>;

    /// Raw transactions; `None` where the daemon no longer has one.
    async fn raw_transactions(&self, hashes: &[TxHash]) -> Result<Vec<Option<Vec<u8>>>, DaemonError>;

    /// Relay a signed transaction, returning its hash.
    async fn broadcast_transaction(&self, raw: &[u8]) -> Result<TxHash, DaemonError>;

    /// Fee rate per kB for confirmation within `blocks`, or -1 when the
    /// daemon cannot tell.
    async fn estimate_fee(&self, blocks: u32) -> Result<f64, DaemonError>;

    /// Minimum relay fee rate per kB.
    async fn relay_fee(&self) -> Result<f64, DaemonError>;
}
