use hub_02_storage::StorageError;
use hub_04_block_processor::DaemonError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MempoolError {
    #[error("Daemon error: {0}")]
    Daemon(#[from] DaemonError),

    #[error("UTXO lookup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Mempool task failed: {0}")]
    Task(String),
}
