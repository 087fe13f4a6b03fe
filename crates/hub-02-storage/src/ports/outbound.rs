//! # Outbound Ports (Driven Ports)
//!
//! Backends the hub database is built on.
//!
//! Production: `RocksDbStore` (node-runtime/adapters/storage/rocksdb_adapter.rs)
//! and [`FileHeaderStore`](crate::adapters::headers::FileHeaderStore).
//! Testing: [`InMemoryKVStore`] and
//! [`MemoryHeaderStore`](crate::adapters::headers::MemoryHeaderStore).

use std::collections::BTreeMap;

use shared_types::{BlockHash, Height};

use crate::domain::errors::{KVStoreError, StorageError};

/// An ordered key-value store.
///
/// `prefix_scan` must return entries in ascending key order.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Apply every operation or none of them.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// All entries whose key starts with `prefix`, in key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            BatchOperation::Put { key, .. } | BatchOperation::Delete { key } => key,
        }
    }
}

/// In-memory key-value store for tests and ephemeral hubs.
#[derive(Debug, Default)]
pub struct InMemoryKVStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError> {
        self.data.remove(key);
        Ok(())
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    self.data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    self.data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        Ok(self
            .data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Fixed-size header records, seekable by height.
pub trait HeaderStore: Send + Sync {
    /// Number of stored headers; the tip is `count - 1`.
    fn count(&self) -> u32;

    fn tip_height(&self) -> Option<Height> {
        self.count().checked_sub(1)
    }

    /// Append the header for height `count()`.
    fn append(&self, header: &[u8]) -> Result<(), StorageError>;

    /// Concatenated raw headers `[start, start + count)`, clipped to the tip.
    fn read_range(&self, start: Height, count: u32) -> Result<Vec<u8>, StorageError>;

    /// Drop every header at or above `count`.
    fn truncate(&self, count: u32) -> Result<(), StorageError>;

    fn block_hash(&self, height: Height) -> Option<BlockHash>;

    /// Hashes of headers `[start, start + count)`, clipped to the tip.
    fn block_hashes(&self, start: Height, count: u32) -> Vec<BlockHash>;

    fn header(&self, height: Height) -> Result<Vec<u8>, StorageError> {
        let count = self.count();
        if height >= count {
            return Err(StorageError::HeaderOutOfRange { height, count });
        }
        self.read_range(height, 1)
    }
}
