//! # Hub Database Service
//!
//! [`HubDb`] owns the key-value store behind one `parking_lot` RwLock.
//!
//! ## Isolation
//!
//! - Readers either take the read lock per call (the [`RawReader`] impl on
//!   [`HubDb`]) or hold it across many calls through a [`ReadView`].
//! - The block writer opens a [`BlockTxn`] holding the *upgradable* read
//!   lock: readers keep running while the block is built, and a second
//!   writer cannot start. Writes are staged in an overlay the transaction
//!   reads through.
//! - `commit` upgrades to the write lock for one atomic batch, so readers see
//!   the state before or after the block, never in between. Dropping the
//!   transaction without committing discards the overlay.
//!
//! ## Undo log
//!
//! Each commit also writes the prior value of every changed key under the
//! block height, and prunes the record that has fallen out of the reorg
//! window. [`HubDb::rewind_block`] replays one record backwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard};
use shared_types::Height;
use tracing::{debug, info};

use crate::adapters::headers::{FileHeaderStore, MemoryHeaderStore};
use crate::adapters::lock::DataDirLock;
use crate::domain::entities::UndoRecord;
use crate::domain::errors::{encode_error, StorageError};
use crate::domain::keys::KeyPrefix;
use crate::ports::inbound::{RawReader, RawWriter, UtxoReader};
use crate::ports::outbound::{BatchOperation, HeaderStore, InMemoryKVStore, KeyValueStore};

type Store = Box<dyn KeyValueStore>;

/// The UTXO and claim-trie database.
pub struct HubDb {
    store: RwLock<Store>,
    reorg_limit: u32,
}

/// What one commit changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSummary {
    pub height: Height,
    pub keys_changed: usize,
}

impl HubDb {
    pub fn new(store: Store, reorg_limit: u32) -> Self {
        Self {
            store: RwLock::new(store),
            reorg_limit,
        }
    }

    pub fn in_memory(reorg_limit: u32) -> Self {
        Self::new(Box::new(InMemoryKVStore::new()), reorg_limit)
    }

    pub fn reorg_limit(&self) -> u32 {
        self.reorg_limit
    }

    /// Consistent read-only view; blocks commits while held.
    pub fn snapshot(&self) -> ReadView<'_> {
        ReadView {
            guard: self.store.read(),
        }
    }

    /// Start building the block at `height`, which must directly follow the
    /// committed tip (or be 0 on an empty database).
    pub fn begin_block(&self, height: Height) -> Result<BlockTxn<'_>, StorageError> {
        let txn = BlockTxn {
            guard: self.store.upgradable_read(),
            height,
            reorg_limit: self.reorg_limit,
            overlay: BTreeMap::new(),
        };
        let tip = txn.chain_state()?.map(|state| state.height);
        let expected = tip.map_or(0, |tip| tip + 1);
        if height != expected {
            return Err(StorageError::NonSequentialBlock { height, tip });
        }
        Ok(txn)
    }

    /// Undo the committed tip block at `height`, returning the applied
    /// record so callers can tell which rows the block had touched.
    pub fn rewind_block(&self, height: Height) -> Result<UndoRecord, StorageError> {
        let guard = self.store.upgradable_read();
        let undo_key = KeyPrefix::undo(height);
        let raw = guard
            .get(&undo_key)?
            .ok_or(StorageError::MissingUndo(height))?;
        let record: UndoRecord =
            bincode::deserialize(&raw).map_err(|e| encode_error("undo record", e))?;

        let mut ops: Vec<BatchOperation> = record
            .entries
            .iter()
            .map(|(key, prior)| match prior {
                Some(value) => BatchOperation::put(key.clone(), value.clone()),
                None => BatchOperation::delete(key.clone()),
            })
            .collect();
        ops.push(BatchOperation::delete(undo_key));
        let restored = ops.len() - 1;

        let mut store = RwLockUpgradableReadGuard::upgrade(guard);
        store.atomic_batch_write(ops)?;
        debug!(height, restored, "Rewound block");
        Ok(record)
    }

    /// Heights that still have an undo record, ascending.
    pub fn undo_heights(&self) -> Result<Vec<Height>, StorageError> {
        self.scan_raw(&[KeyPrefix::Undo.byte()])?
            .into_iter()
            .map(|(key, _)| {
                <[u8; 4]>::try_from(&key[1..])
                    .map(Height::from_be_bytes)
                    .map_err(|_| StorageError::MalformedKey {
                        prefix: KeyPrefix::Undo.as_char(),
                        len: key.len(),
                    })
            })
            .collect()
    }
}

impl RawReader for HubDb {
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.store.read().get(key)?)
    }

    fn scan_raw(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        Ok(self.store.read().prefix_scan(prefix)?)
    }
}

/// A read lock held across several reads.
pub struct ReadView<'a> {
    guard: RwLockReadGuard<'a, Store>,
}

impl RawReader for ReadView<'_> {
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.guard.get(key)?)
    }

    fn scan_raw(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        Ok(self.guard.prefix_scan(prefix)?)
    }
}

/// Staged writes for one block.
pub struct BlockTxn<'a> {
    guard: RwLockUpgradableReadGuard<'a, Store>,
    height: Height,
    reorg_limit: u32,
    overlay: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl BlockTxn<'_> {
    pub fn height(&self) -> Height {
        self.height
    }

    /// Number of staged key writes, including no-op rewrites.
    pub fn staged(&self) -> usize {
        self.overlay.len()
    }

    /// Apply the staged writes and the block's undo record atomically.
    pub fn commit(self) -> Result<CommitSummary, StorageError> {
        let BlockTxn {
            guard,
            height,
            reorg_limit,
            overlay,
        } = self;

        let mut ops = Vec::with_capacity(overlay.len() + 2);
        let mut undo = UndoRecord::default();
        for (key, value) in overlay {
            let prior = guard.get(&key)?;
            if prior == value {
                continue;
            }
            undo.entries.push((key.clone(), prior));
            ops.push(match value {
                Some(value) => BatchOperation::put(key, value),
                None => BatchOperation::delete(key),
            });
        }
        let keys_changed = ops.len();

        let raw_undo = bincode::serialize(&undo).map_err(|e| encode_error("undo record", e))?;
        ops.push(BatchOperation::put(KeyPrefix::undo(height), raw_undo));
        if let Some(expired) = height.checked_sub(reorg_limit) {
            if expired < height {
                ops.push(BatchOperation::delete(KeyPrefix::undo(expired)));
            }
        }

        let mut store = RwLockUpgradableReadGuard::upgrade(guard);
        store.atomic_batch_write(ops)?;
        debug!(height, keys_changed, "Committed block");
        Ok(CommitSummary {
            height,
            keys_changed,
        })
    }
}

impl RawReader for BlockTxn<'_> {
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        match self.overlay.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => Ok(self.guard.get(key)?),
        }
    }

    fn scan_raw(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.guard.prefix_scan(prefix)?.into_iter().collect();
        for (key, staged) in self
            .overlay
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            match staged {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}

impl RawWriter for BlockTxn<'_> {
    fn put_raw(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.overlay.insert(key, Some(value));
    }

    fn delete_raw(&mut self, key: Vec<u8>) {
        self.overlay.insert(key, None);
    }
}

// =============================================================================
// STORAGE BUNDLE
// =============================================================================

/// The database, the headers and (on disk) the directory lock.
pub struct HubStorage {
    pub db: Arc<HubDb>,
    pub headers: Arc<dyn HeaderStore>,
    _lock: Option<DataDirLock>,
}

impl HubStorage {
    /// Open on-disk storage in `dir` over the given key-value backend.
    pub fn open(
        dir: &std::path::Path,
        store: Store,
        reorg_limit: u32,
    ) -> Result<Self, StorageError> {
        std::fs::create_dir_all(dir)?;
        let lock = DataDirLock::acquire(dir)?;
        let headers = FileHeaderStore::open(dir)?;
        let storage = Self {
            db: Arc::new(HubDb::new(store, reorg_limit)),
            headers: Arc::new(headers),
            _lock: Some(lock),
        };
        storage.reconcile_headers()?;
        Ok(storage)
    }

    pub fn in_memory(reorg_limit: u32) -> Self {
        Self {
            db: Arc::new(HubDb::in_memory(reorg_limit)),
            headers: Arc::new(MemoryHeaderStore::new()),
            _lock: None,
        }
    }

    /// Truncate the headers to the committed tip.
    pub fn reconcile_headers(&self) -> Result<(), StorageError> {
        let committed = self.db.chain_state()?.map_or(0, |state| state.height + 1);
        let stored = self.headers.count();
        if stored > committed {
            info!(stored, committed, "Truncating headers to committed tip");
            self.headers.truncate(committed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ChainState, ClaimTrieEntry, UtxoEntry};
    use crate::ports::inbound::{ClaimTrieReader, ClaimTrieWriter, UtxoWriter};
    use shared_types::{ClaimHash, HashX, Outpoint, HASHX_LEN};

    fn state(height: Height) -> ChainState {
        ChainState {
            height,
            tip: [height as u8; 32],
            tx_count: height as u64 + 1,
            utxo_count: 0,
        }
    }

    fn commit_block(db: &HubDb, height: Height, outpoint: Outpoint, value: u64) {
        let mut txn = db.begin_block(height).unwrap();
        txn.add_utxo(
            &outpoint,
            UtxoEntry {
                hashx: HashX([1u8; HASHX_LEN]),
                value,
            },
        );
        txn.put_chain_state(&state(height)).unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn test_txn_reads_its_own_writes() {
        let db = HubDb::in_memory(10);
        let hashx = HashX([1u8; HASHX_LEN]);
        let mut txn = db.begin_block(0).unwrap();
        let outpoint = Outpoint::new([5u8; 32], 0);
        txn.add_utxo(&outpoint, UtxoEntry { hashx, value: 7 });
        assert_eq!(txn.get_balance(&hashx).unwrap(), 7);
        // Not visible outside the transaction until commit.
        assert_eq!(db.snapshot().get_utxo(&outpoint).unwrap(), None);
        txn.put_chain_state(&state(0)).unwrap();
        txn.commit().unwrap();
        assert_eq!(db.get_balance(&hashx).unwrap(), 7);
    }

    #[test]
    fn test_dropped_txn_is_rolled_back() {
        let db = HubDb::in_memory(10);
        {
            let mut txn = db.begin_block(0).unwrap();
            txn.put_trie_entry(&ClaimTrieEntry {
                name: "foo".into(),
                claim_hash: ClaimHash([1u8; 20]),
                last_take_over_height: 0,
            })
            .unwrap();
        }
        assert_eq!(db.get_trie_entry("foo").unwrap(), None);
        assert!(db.begin_block(0).is_ok());
    }

    #[test]
    fn test_begin_block_requires_sequence() {
        let db = HubDb::in_memory(10);
        assert!(matches!(
            db.begin_block(1),
            Err(StorageError::NonSequentialBlock { height: 1, tip: None })
        ));
        commit_block(&db, 0, Outpoint::new([1u8; 32], 0), 1);
        assert!(db.begin_block(2).is_err());
        assert!(db.begin_block(1).is_ok());
    }

    #[test]
    fn test_scan_merges_overlay_deletes() {
        let db = HubDb::in_memory(10);
        let a = Outpoint::new([1u8; 32], 0);
        let b = Outpoint::new([2u8; 32], 0);
        commit_block(&db, 0, a, 5);
        let mut txn = db.begin_block(1).unwrap();
        txn.spend_utxo(&a).unwrap();
        txn.add_utxo(
            &b,
            UtxoEntry {
                hashx: HashX([1u8; HASHX_LEN]),
                value: 3,
            },
        );
        let utxos = txn.get_hashx_utxos(&HashX([1u8; HASHX_LEN])).unwrap();
        assert_eq!(utxos, vec![(b, 3)]);
    }

    #[test]
    fn test_rewind_restores_prior_state() {
        let db = HubDb::in_memory(10);
        let a = Outpoint::new([1u8; 32], 0);
        let b = Outpoint::new([2u8; 32], 0);
        commit_block(&db, 0, a, 5);
        let before: Vec<_> = db.scan_raw(&[]).unwrap();

        let mut txn = db.begin_block(1).unwrap();
        txn.spend_utxo(&a).unwrap();
        txn.add_utxo(
            &b,
            UtxoEntry {
                hashx: HashX([2u8; HASHX_LEN]),
                value: 4,
            },
        );
        txn.put_chain_state(&state(1)).unwrap();
        txn.commit().unwrap();
        assert_eq!(db.get_utxo(&a).unwrap(), None);

        let record = db.rewind_block(1).unwrap();
        assert_eq!(record.keys_in(KeyPrefix::Utxo).count(), 2);
        assert_eq!(db.scan_raw(&[]).unwrap(), before);
        assert_eq!(db.chain_state().unwrap().map(|s| s.height), Some(0));
        assert!(matches!(db.rewind_block(1), Err(StorageError::MissingUndo(1))));
    }

    #[test]
    fn test_undo_records_are_pruned_to_reorg_window() {
        let db = HubDb::in_memory(3);
        for height in 0..6 {
            commit_block(&db, height, Outpoint::new([height as u8; 32], 0), 1);
        }
        assert_eq!(db.undo_heights().unwrap(), vec![3, 4, 5]);
    }

    #[test]
    fn test_storage_open_truncates_uncommitted_headers() {
        let dir = tempfile::tempdir().unwrap();
        {
            let headers = FileHeaderStore::open(dir.path()).unwrap();
            headers.append(&[0u8; 112]).unwrap();
            headers.append(&[1u8; 112]).unwrap();
        }
        let storage = HubStorage::open(dir.path(), Box::new(InMemoryKVStore::new()), 10).unwrap();
        assert_eq!(storage.headers.count(), 0);
        assert!(HubStorage::open(dir.path(), Box::new(InMemoryKVStore::new()), 10).is_err());
    }
}
