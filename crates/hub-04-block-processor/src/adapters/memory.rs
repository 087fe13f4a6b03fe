//! In-memory daemon for tests: a chain of blocks and a mempool that tests
//! edit directly.

use std::collections::BTreeMap;

use async_trait::async_trait;
use hub_01_codec::{Block, Transaction};
use parking_lot::RwLock;
use shared_types::{BlockHash, Height, TxHash};

use crate::domain::errors::DaemonError;
use crate::ports::outbound::DaemonApi;

#[derive(Default)]
struct Chain {
    blocks: Vec<(BlockHash, Vec<u8>)>,
    mempool: BTreeMap<TxHash, Vec<u8>>,
    broadcasts: Vec<Vec<u8>>,
    cached_height: Option<Height>,
}

/// A scripted daemon.
pub struct MemoryDaemon {
    chain: RwLock<Chain>,
    fee_rate: f64,
    relay_fee: f64,
}

impl Default for MemoryDaemon {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDaemon {
    pub fn new() -> Self {
        Self {
            chain: RwLock::new(Chain::default()),
            fee_rate: 0.0001,
            relay_fee: 0.00001,
        }
    }

    pub fn push_block(&self, block: &Block) {
        self.chain
            .write()
            .blocks
            .push((block.header.hash(), block.encode()));
    }

    /// Replace every block from `height` up with `blocks`.
    pub fn reorganize(&self, height: Height, blocks: &[Block]) {
        let mut chain = self.chain.write();
        chain.blocks.truncate(height as usize);
        chain
            .blocks
            .extend(blocks.iter().map(|b| (b.header.hash(), b.encode())));
    }

    pub fn tip_hash(&self) -> Option<BlockHash> {
        self.chain.read().blocks.last().map(|(hash, _)| *hash)
    }

    pub fn add_mempool_tx(&self, tx: &Transaction) {
        self.chain.write().mempool.insert(tx.txid(), tx.encode());
    }

    pub fn remove_mempool_tx(&self, tx_hash: &TxHash) {
        self.chain.write().mempool.remove(tx_hash);
    }

    pub fn clear_mempool(&self) {
        self.chain.write().mempool.clear();
    }

    /// Transactions received through `broadcast_transaction`.
    pub fn broadcasts(&self) -> Vec<Vec<u8>> {
        self.chain.read().broadcasts.clone()
    }
}

#[async_trait]
impl DaemonApi for MemoryDaemon {
    async fn height(&self) -> Result<Height, DaemonError> {
        let mut chain = self.chain.write();
        let height = chain.blocks.len().checked_sub(1).ok_or(DaemonError::Rpc {
            code: -28,
            message: "no blocks".into(),
        })? as Height;
        chain.cached_height = Some(height);
        Ok(height)
    }

    fn cached_height(&self) -> Option<Height> {
        self.chain.read().cached_height
    }

    async fn block_hashes(&self, first: Height, count: u32) -> Result<Vec<BlockHash>, DaemonError> {
        let chain = self.chain.read();
        (first..first + count)
            .map(|height| {
                chain
                    .blocks
                    .get(height as usize)
                    .map(|(hash, _)| *hash)
                    .ok_or(DaemonError::Rpc {
                        code: -8,
                        message: "Block height out of range".into(),
                    })
            })
            .collect()
    }

    async fn raw_blocks(&self, hashes: &[BlockHash]) -> Result<Vec<Vec<u8>>, DaemonError> {
        let chain = self.chain.read();
        hashes
            .iter()
            .map(|hash| {
                chain
                    .blocks
                    .iter()
                    .find(|(h, _)| h == hash)
                    .map(|(_, raw)| raw.clone())
                    .ok_or(DaemonError::Rpc {
                        code: -5,
                        message: "Block not found".into(),
                    })
            })
            .collect()
    }

    async fn mempool_hashes(&self) -> Result<Vec<TxHash>, DaemonError> {
        Ok(self.chain.read().mempool.keys().copied().collect())
    }

    async fn raw_transactions(&self, hashes: &[TxHash]) -> Result<Vec<Option<Vec<u8>>>, DaemonError> {
        let chain = self.chain.read();
        Ok(hashes
            .iter()
            .map(|hash| chain.mempool.get(hash).cloned())
            .collect())
    }

    async fn broadcast_transaction(&self, raw: &[u8]) -> Result<TxHash, DaemonError> {
        let tx = Transaction::decode(raw).map_err(|e| DaemonError::Rpc {
            code: -22,
            message: format!("TX decode failed: {e}"),
        })?;
        let tx_hash = tx.txid();
        let mut chain = self.chain.write();
        chain.broadcasts.push(raw.to_vec());
        chain.mempool.insert(tx_hash, raw.to_vec());
        Ok(tx_hash)
    }

    async fn estimate_fee(&self, _blocks: u32) -> Result<f64, DaemonError> {
        Ok(self.fee_rate)
    }

    async fn relay_fee(&self) -> Result<f64, DaemonError> {
        Ok(self.relay_fee)
    }
}
