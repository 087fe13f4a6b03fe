//! # Hub Storage (hub-02)
//!
//! The durable state of the hub: unspent outputs, confirmed transactions,
//! address history, claims, supports and the claim trie, all in one ordered
//! key-value space, plus the flat headers file.
//!
//! ## Guarantees
//!
//! | Guarantee | Mechanism |
//! |-----------|-----------|
//! | Single writer | a block transaction holds the upgradable read lock |
//! | Atomic blocks | staged overlay applied in one `atomic_batch_write` |
//! | Snapshot reads | readers hold the read lock; commit needs the write lock |
//! | Exact rewind | per-block undo records, kept for `reorg_limit` blocks |
//!
//! The backend is any [`KeyValueStore`] with ordered prefix scans.
//! [`InMemoryKVStore`] ships here; the RocksDB adapter lives in
//! `node-runtime`.
//!
//! ## Crate Structure
//!
//! - `domain/` - key schema, rows, errors
//! - `ports/` - typed readers/writers (inbound), key-value and header stores (outbound)
//! - `adapters/` - headers file, data directory lock
//! - `service.rs` - [`HubDb`], [`BlockTxn`], [`HubStorage`]

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::headers::{FileHeaderStore, MemoryHeaderStore};
pub use adapters::lock::DataDirLock;
pub use domain::entities::{
    ChainState, ClaimRecord, ClaimTrieEntry, HistoryItem, SupportRecord, TxLocation, UndoRecord,
    UtxoEntry,
};
pub use domain::errors::{KVStoreError, LockError, StorageError};
pub use domain::keys::KeyPrefix;
pub use ports::inbound::{
    ClaimTrieReader, ClaimTrieWriter, RawReader, RawWriter, UtxoReader, UtxoWriter,
};
pub use ports::outbound::{BatchOperation, HeaderStore, InMemoryKVStore, KeyValueStore};
pub use service::{BlockTxn, CommitSummary, HubDb, HubStorage, ReadView};
