//! # Production Storage Adapters
//!
//! Opens the hub database in the configured data directory.
//!
//! With the default `rocksdb` feature the key-value store is
//! [`RocksDbStore`]. Without it the runtime falls back to the in-memory
//! store: the headers file persists but the index does not, so every
//! restart resyncs from genesis.

use std::path::Path;

use hub_02_storage::{HubStorage, KeyValueStore, StorageError};
use tracing::{info, warn};

use crate::container::config::HubConfig;

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore, ROCKSDB_DIR};

/// Free space below this share of the volume is logged as a warning.
pub const LOW_DISK_PERCENT: u8 = 5;

/// Space on the volume holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSpace {
    pub available: u64,
    pub total: u64,
}

impl DiskSpace {
    pub fn of(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            available: fs2::available_space(path)?,
            total: fs2::total_space(path)?,
        })
    }

    pub fn percent_free(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.available as f64 / self.total as f64) * 100.0) as u8
    }
}

/// Open the database and headers file, truncating the headers to the
/// committed tip.
pub fn open_storage(config: &HubConfig) -> Result<HubStorage, StorageError> {
    let dir = &config.storage.db_directory;
    std::fs::create_dir_all(dir)?;
    match DiskSpace::of(dir) {
        Ok(space) if space.percent_free() < LOW_DISK_PERCENT => warn!(
            available = space.available,
            percent = space.percent_free(),
            "Low disk space in data directory"
        ),
        Ok(space) => info!(available = space.available, "Data directory disk space"),
        Err(err) => warn!(error = %err, "Could not read disk space"),
    }

    let store = key_value_store(config)?;
    let storage = HubStorage::open(dir, store, config.network.params().reorg_limit)?;
    info!(
        path = %dir.display(),
        headers = storage.headers.count(),
        "Storage opened"
    );
    Ok(storage)
}

#[cfg(feature = "rocksdb")]
fn key_value_store(config: &HubConfig) -> Result<Box<dyn KeyValueStore>, StorageError> {
    let store = RocksDbStore::open(RocksDbConfig::from_storage(&config.storage))?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "rocksdb"))]
fn key_value_store(_config: &HubConfig) -> Result<Box<dyn KeyValueStore>, StorageError> {
    warn!("Built without RocksDB; the index is kept in memory only");
    Ok(Box::new(hub_02_storage::InMemoryKVStore::new()))
}
