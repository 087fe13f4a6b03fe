//! # RocksDB Storage Adapter
//!
//! Production [`KeyValueStore`] for the hub database.
//!
//! ## Layout
//!
//! One keyspace. Records are separated by the one-byte prefixes of
//! [`KeyPrefix`](hub_02_storage::KeyPrefix), so every prefix scan is a
//! forward iteration from the prefix that stops at the first foreign key.
//!
//! ## Configuration
//!
//! - LRU block cache and bloom filters for point lookups
//! - Snappy compression
//! - Optional fsync per write; a block commit is one `WriteBatch`

use std::path::{Path, PathBuf};

use hub_02_storage::{BatchOperation, KVStoreError, KeyValueStore};
use rocksdb::{
    BlockBasedOptions, Cache, DBCompressionType, Direction, IteratorMode, Options, WriteBatch,
    WriteOptions, DB,
};

use crate::container::config::StorageConfig;

/// Subdirectory of the data directory holding the RocksDB files.
pub const ROCKSDB_DIR: &str = "rocksdb";

#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    pub path: PathBuf,
    pub block_cache_size: usize,
    pub write_buffer_size: usize,
    pub max_write_buffer_number: i32,
    pub target_file_size_base: u64,
    /// fsync after each write.
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self::from_storage(&StorageConfig::default())
    }
}

impl RocksDbConfig {
    pub fn from_storage(storage: &StorageConfig) -> Self {
        Self {
            path: storage.db_directory.join(ROCKSDB_DIR),
            block_cache_size: storage.block_cache_mb * 1024 * 1024,
            write_buffer_size: storage.write_buffer_mb * 1024 * 1024,
            max_write_buffer_number: 3,
            target_file_size_base: 64 * 1024 * 1024,
            sync_writes: storage.sync_writes,
        }
    }

    /// Small buffers, no fsync.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,
            write_buffer_size: 4 * 1024 * 1024,
            max_write_buffer_number: 2,
            target_file_size_base: 4 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

pub struct RocksDbStore {
    db: DB,
    config: RocksDbConfig,
}

impl RocksDbStore {
    pub fn open(config: RocksDbConfig) -> Result<Self, KVStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_target_file_size_base(config.target_file_size_base);
        opts.set_compression_type(DBCompressionType::Snappy);

        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &config.path).map_err(|e| KVStoreError::IOError {
            message: format!("Failed to open RocksDB at {}: {}", config.path.display(), e),
        })?;
        Ok(Self { db, config })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn write_options(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }
}

fn io_error(what: &str, err: rocksdb::Error) -> KVStoreError {
    KVStoreError::IOError {
        message: format!("RocksDB {what} failed: {err}"),
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.db.get(key).map_err(|e| io_error("get", e))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.db
            .put_opt(key, value, &self.write_options())
            .map_err(|e| io_error("put", e))
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError> {
        self.db
            .delete_opt(key, &self.write_options())
            .map_err(|e| io_error("delete", e))
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut batch = WriteBatch::default();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put(&key, &value),
                BatchOperation::Delete { key } => batch.delete(&key),
            }
        }
        self.db
            .write_opt(batch, &self.write_options())
            .map_err(|e| io_error("batch write", e))
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        self.db
            .get_pinned(key)
            .map(|v| v.is_some())
            .map_err(|e| io_error("exists check", e))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let mut results = Vec::new();
        for item in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item.map_err(|e| io_error("scan", e))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_01_codec::test_utils::{coinbase_tx, p2pkh_script, BlockBuilder};
    use hub_02_storage::{HubStorage, UtxoReader};
    use hub_03_claimtrie::ClaimTrieEngine;
    use hub_04_block_processor::BlockProcessor;
    use shared_types::{hashx_from_payment_script, ZERO_HASH};
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> RocksDbStore {
        RocksDbStore::open(RocksDbConfig::for_testing(dir.path())).unwrap()
    }

    #[test]
    fn test_rocksdb_basic_operations() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);

        store.put(b"key1", b"value1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert!(store.exists(b"key1").unwrap());
        assert!(!store.exists(b"nonexistent").unwrap());

        store.delete(b"key1").unwrap();
        assert!(!store.exists(b"key1").unwrap());
    }

    #[test]
    fn test_rocksdb_batch_applies_in_order() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);

        store
            .atomic_batch_write(vec![
                BatchOperation::put(b"a", b"1"),
                BatchOperation::put(b"b", b"2"),
                BatchOperation::delete(b"a"),
                BatchOperation::put(b"c", b"3"),
            ])
            .unwrap();

        assert!(!store.exists(b"a").unwrap());
        assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.get(b"c").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn test_rocksdb_prefix_scan_is_ordered_and_bounded() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);

        store.put(b"u\x02", b"two").unwrap();
        store.put(b"u\x01", b"one").unwrap();
        store.put(b"v\x00", b"other").unwrap();
        store.put(b"t\xff", b"before").unwrap();

        let rows = store.prefix_scan(b"u").unwrap();
        assert_eq!(
            rows,
            vec![
                (b"u\x01".to_vec(), b"one".to_vec()),
                (b"u\x02".to_vec(), b"two".to_vec()),
            ]
        );
        assert!(store.prefix_scan(b"w").unwrap().is_empty());
    }

    #[test]
    fn test_rocksdb_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = open(&dir);
            store.put(b"persisted", b"yes").unwrap();
        }
        let store = open(&dir);
        assert_eq!(store.get(b"persisted").unwrap(), Some(b"yes".to_vec()));
    }

    #[test]
    fn test_committed_block_survives_restart() {
        let dir = TempDir::new().unwrap();
        let open_storage = || {
            let store = RocksDbStore::open(RocksDbConfig::for_testing(dir.path().join(ROCKSDB_DIR)))
                .unwrap();
            HubStorage::open(dir.path(), Box::new(store), 200).unwrap()
        };

        let block = BlockBuilder::new(ZERO_HASH)
            .with_transaction(coinbase_tx(0, 50_000, p2pkh_script([7; 20])))
            .build();
        {
            let storage = open_storage();
            let processor = BlockProcessor::new(
                storage.db.clone(),
                storage.headers.clone(),
                ClaimTrieEngine::default(),
            );
            processor.advance_block(&block.encode()).unwrap();
        }

        let storage = open_storage();
        assert_eq!(storage.headers.count(), 1);
        assert_eq!(storage.db.chain_state().unwrap().map(|state| state.height), Some(0));
        let hashx = hashx_from_payment_script(&p2pkh_script([7; 20]));
        assert_eq!(storage.db.get_balance(&hashx).unwrap(), 50_000);
    }
}
