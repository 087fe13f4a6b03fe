pub mod entities;
pub mod errors;
pub mod histogram;
pub mod pool;

pub use entities::{MempoolStatus, MempoolTx, MempoolUtxo, PendingTx, TxSummary, ValuePair};
pub use errors::MempoolError;
pub use histogram::{compact_fee_histogram, DEFAULT_BIN_SIZE};
pub use pool::{TxPool, UtxoMap};
