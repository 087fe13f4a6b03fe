//! # Headers File
//!
//! Raw 112-byte headers stored back to back, so the header at height `h`
//! starts at byte `h * 112`. Block hashes are kept in memory for reorg
//! detection and checkpoint proofs.
//!
//! The file is appended before the block's key-value commit. On startup the
//! runtime truncates it to the committed tip, which drops any header whose
//! block never committed.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use hub_01_codec::header_hash;
use parking_lot::{Mutex, RwLock};
use shared_types::{BlockHash, Height, HEADER_SIZE};
use tracing::{info, warn};

use crate::domain::errors::StorageError;
use crate::ports::outbound::HeaderStore;

fn check_len(header: &[u8]) -> Result<(), StorageError> {
    if header.len() != HEADER_SIZE {
        return Err(StorageError::InvalidHeader {
            expected: HEADER_SIZE,
            actual: header.len(),
        });
    }
    Ok(())
}

/// Clip `[start, start + count)` to `[0, len)`.
fn clip(start: Height, count: u32, len: u32) -> (u32, u32) {
    if start >= len {
        return (start, 0);
    }
    (start, count.min(len - start))
}

// =============================================================================
// FILE-BACKED
// =============================================================================

struct HeadersFile {
    file: File,
    hashes: Vec<BlockHash>,
}

/// Headers persisted in a single flat file.
pub struct FileHeaderStore {
    path: PathBuf,
    inner: Mutex<HeadersFile>,
}

impl FileHeaderStore {
    pub const FILE_NAME: &'static str = "headers";

    /// Open (or create) `dir/headers`, dropping a trailing partial record.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        let path = dir.join(Self::FILE_NAME);
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        let len = file.metadata()?.len();
        let whole = len - len % HEADER_SIZE as u64;
        if whole != len {
            warn!(path = %path.display(), len, "Dropping partial header record");
            file.set_len(whole)?;
        }

        let mut raw = Vec::with_capacity(whole as usize);
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut raw)?;
        let hashes: Vec<BlockHash> = raw.chunks_exact(HEADER_SIZE).map(header_hash).collect();
        info!(path = %path.display(), headers = hashes.len(), "Opened headers file");

        Ok(Self {
            path,
            inner: Mutex::new(HeadersFile { file, hashes }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HeaderStore for FileHeaderStore {
    fn count(&self) -> u32 {
        self.inner.lock().hashes.len() as u32
    }

    fn append(&self, header: &[u8]) -> Result<(), StorageError> {
        check_len(header)?;
        let mut inner = self.inner.lock();
        let offset = inner.hashes.len() as u64 * HEADER_SIZE as u64;
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(header)?;
        inner.file.flush()?;
        inner.hashes.push(header_hash(header));
        Ok(())
    }

    fn read_range(&self, start: Height, count: u32) -> Result<Vec<u8>, StorageError> {
        let mut inner = self.inner.lock();
        let (start, count) = clip(start, count, inner.hashes.len() as u32);
        let mut out = vec![0u8; count as usize * HEADER_SIZE];
        if count > 0 {
            inner
                .file
                .seek(SeekFrom::Start(start as u64 * HEADER_SIZE as u64))?;
            inner.file.read_exact(&mut out)?;
        }
        Ok(out)
    }

    fn truncate(&self, count: u32) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if (count as usize) < inner.hashes.len() {
            inner.file.set_len(count as u64 * HEADER_SIZE as u64)?;
            inner.file.sync_data()?;
            inner.hashes.truncate(count as usize);
        }
        Ok(())
    }

    fn block_hash(&self, height: Height) -> Option<BlockHash> {
        self.inner.lock().hashes.get(height as usize).copied()
    }

    fn block_hashes(&self, start: Height, count: u32) -> Vec<BlockHash> {
        let inner = self.inner.lock();
        let (start, count) = clip(start, count, inner.hashes.len() as u32);
        inner.hashes[start as usize..(start + count) as usize].to_vec()
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// Headers held in memory, for tests and ephemeral hubs.
#[derive(Default)]
pub struct MemoryHeaderStore {
    headers: RwLock<Vec<(Vec<u8>, BlockHash)>>,
}

impl MemoryHeaderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HeaderStore for MemoryHeaderStore {
    fn count(&self) -> u32 {
        self.headers.read().len() as u32
    }

    fn append(&self, header: &[u8]) -> Result<(), StorageError> {
        check_len(header)?;
        self.headers
            .write()
            .push((header.to_vec(), header_hash(header)));
        Ok(())
    }

    fn read_range(&self, start: Height, count: u32) -> Result<Vec<u8>, StorageError> {
        let headers = self.headers.read();
        let (start, count) = clip(start, count, headers.len() as u32);
        Ok(headers[start as usize..(start + count) as usize]
            .iter()
            .flat_map(|(raw, _)| raw.iter().copied())
            .collect())
    }

    fn truncate(&self, count: u32) -> Result<(), StorageError> {
        self.headers.write().truncate(count as usize);
        Ok(())
    }

    fn block_hash(&self, height: Height) -> Option<BlockHash> {
        self.headers.read().get(height as usize).map(|(_, hash)| *hash)
    }

    fn block_hashes(&self, start: Height, count: u32) -> Vec<BlockHash> {
        let headers = self.headers.read();
        let (start, count) = clip(start, count, headers.len() as u32);
        headers[start as usize..(start + count) as usize]
            .iter()
            .map(|(_, hash)| *hash)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(nonce: u8) -> Vec<u8> {
        let mut raw = vec![0u8; HEADER_SIZE];
        raw[HEADER_SIZE - 1] = nonce;
        raw
    }

    #[test]
    fn test_file_store_reopens_with_hashes() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileHeaderStore::open(dir.path()).unwrap();
            for n in 0..3 {
                store.append(&header(n)).unwrap();
            }
        }
        let store = FileHeaderStore::open(dir.path()).unwrap();
        assert_eq!(store.count(), 3);
        assert_eq!(store.tip_height(), Some(2));
        assert_eq!(store.block_hash(1), Some(header_hash(&header(1))));
        assert_eq!(store.header(2).unwrap(), header(2));
    }

    #[test]
    fn test_partial_record_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FileHeaderStore::FILE_NAME);
        let mut raw = header(0);
        raw.extend_from_slice(&[1, 2, 3]);
        std::fs::write(&path, raw).unwrap();
        let store = FileHeaderStore::open(dir.path()).unwrap();
        assert_eq!(store.count(), 1);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), HEADER_SIZE as u64);
    }

    #[test]
    fn test_truncate_and_clipped_reads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHeaderStore::open(dir.path()).unwrap();
        for n in 0..5 {
            store.append(&header(n)).unwrap();
        }
        assert_eq!(store.read_range(3, 10).unwrap().len(), 2 * HEADER_SIZE);
        assert!(store.read_range(9, 1).unwrap().is_empty());
        store.truncate(2).unwrap();
        assert_eq!(store.count(), 2);
        assert!(store.header(2).is_err());
        store.append(&header(9)).unwrap();
        assert_eq!(store.block_hash(2), Some(header_hash(&header(9))));
    }

    #[test]
    fn test_memory_store_matches_file_store() {
        let memory = MemoryHeaderStore::new();
        for n in 0..4 {
            memory.append(&header(n)).unwrap();
        }
        assert!(memory.append(&[0u8; 80]).is_err());
        assert_eq!(memory.block_hashes(1, 2).len(), 2);
        assert_eq!(memory.read_range(0, 4).unwrap().len(), 4 * HEADER_SIZE);
        memory.truncate(1).unwrap();
        assert_eq!(memory.tip_height(), Some(0));
    }
}
