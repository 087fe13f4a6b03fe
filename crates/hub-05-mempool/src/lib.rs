//! # Mempool Index (hub-05)
//!
//! An in-memory mirror of the daemon's unconfirmed transactions, used for
//! address status, unconfirmed balances and history, and the fee histogram.
//! Nothing here is persisted; the whole index can be rebuilt from the daemon
//! at any time.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    compact_fee_histogram, MempoolError, MempoolStatus, MempoolTx, MempoolUtxo, TxPool, TxSummary,
};
pub use ports::UtxoLookup;
pub use service::{MempoolConfig, MempoolIndex, MempoolRefresh};
