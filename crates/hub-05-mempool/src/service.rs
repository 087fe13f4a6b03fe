//! # Mempool Index
//!
//! Keeps [`TxPool`] in step with the daemon's mempool. A refresh:
//!
//! 1. reads the daemon's mempool hashes, retrying if the daemon height moved
//!    meanwhile;
//! 2. drops transactions that left the mempool;
//! 3. fetches new transactions in chunks, resolves their inputs against the
//!    pool and a consistent snapshot of the confirmed store, and accepts
//!    them in rounds until no more resolve;
//! 4. rebuilds the fee histogram.
//!
//! Refreshes are serialized. The runtime refreshes after every block before
//! notifying sessions, so notifications never pair a new block with a stale
//! mempool.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use hub_04_block_processor::DaemonApi;
use parking_lot::RwLock;
use shared_bus::{EventPublisher, HubEvent};
use shared_types::{hash_to_hex_str, HashX, Height, Outpoint, TxHash};
use tokio::sync::{watch, Mutex, Notify};
use tracing::{debug, info, warn};

use crate::domain::{
    compact_fee_histogram, MempoolError, MempoolStatus, MempoolUtxo, PendingTx, TxPool,
    TxSummary, UtxoMap, DEFAULT_BIN_SIZE,
};
use crate::ports::UtxoLookup;

#[derive(Debug, Clone)]
pub struct MempoolConfig {
    pub refresh_interval: Duration,
    /// Transactions requested from the daemon per call.
    pub fetch_chunk: usize,
    pub histogram_bin_size: u64,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(1),
            fetch_chunk: 200,
            histogram_bin_size: DEFAULT_BIN_SIZE,
        }
    }
}

/// Result of one refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MempoolRefresh {
    /// Daemon height the mempool was read at.
    pub height: Height,
    /// HashXs whose unconfirmed state changed.
    pub touched: BTreeSet<HashX>,
    /// HashXs touched by transactions seen for the first time.
    pub new_touched: BTreeSet<HashX>,
}

pub struct MempoolIndex {
    daemon: Arc<dyn DaemonApi>,
    utxos: Arc<dyn UtxoLookup>,
    config: MempoolConfig,
    pool: RwLock<TxPool>,
    histogram: RwLock<Vec<(u64, u64)>>,
    notified: RwLock<HashSet<TxHash>>,
    refresh_lock: Mutex<()>,
    wakeup: Notify,
}

impl MempoolIndex {
    pub fn new(daemon: Arc<dyn DaemonApi>, utxos: Arc<dyn UtxoLookup>, config: MempoolConfig) -> Self {
        Self {
            daemon,
            utxos,
            config,
            pool: RwLock::new(TxPool::new()),
            histogram: RwLock::new(Vec::new()),
            notified: RwLock::new(HashSet::new()),
            refresh_lock: Mutex::new(()),
            wakeup: Notify::new(),
        }
    }

    /// Re-sync with the daemon's mempool.
    pub async fn refresh(&self) -> Result<MempoolRefresh, MempoolError> {
        let _serial = self.refresh_lock.lock().await;

        let (height, live) = loop {
            let before = self.daemon.cached_height();
            let hashes = self.daemon.mempool_hashes().await?;
            let height = self.daemon.height().await?;
            if before == Some(height) {
                break (height, hashes.into_iter().collect::<HashSet<TxHash>>());
            }
        };

        let mut touched = BTreeSet::new();
        let new_hashes: Vec<TxHash> = {
            let mut pool = self.pool.write();
            pool.remove_vanished(&live, &mut touched);
            live.iter().filter(|hash| !pool.contains(hash)).copied().collect()
        };

        let (mut pending, mut utxos) = (HashMap::new(), UtxoMap::new());
        for chunk in new_hashes.chunks(self.config.fetch_chunk.max(1)) {
            let fetched = self.fetch(chunk).await?;
            let prevouts: Vec<Outpoint> = fetched
                .values()
                .flat_map(|tx| tx.prevouts.iter())
                .filter(|prevout| !live.contains(&prevout.tx_hash))
                .copied()
                .collect();
            let found = self.lookup(prevouts.clone()).await?;
            utxos.extend(prevouts.into_iter().zip(found));
            pending.extend(fetched);
        }

        {
            let mut pool = self.pool.write();
            let mut remaining = usize::MAX;
            while !pending.is_empty() && pending.len() != remaining {
                remaining = pending.len();
                (pending, utxos) = pool.accept(pending, utxos, &mut touched);
            }
            if !pending.is_empty() {
                info!(dropped = pending.len(), "Mempool transactions with unresolved inputs dropped");
            }
            *self.histogram.write() =
                compact_fee_histogram(pool.fee_rates(), self.config.histogram_bin_size);
        }

        let new_touched = self.take_new_touched(&live);
        debug!(height, txs = live.len(), touched = touched.len(), "Mempool refreshed");
        Ok(MempoolRefresh {
            height,
            touched,
            new_touched,
        })
    }

    async fn fetch(&self, hashes: &[TxHash]) -> Result<HashMap<TxHash, PendingTx>, MempoolError> {
        let raws = self.daemon.raw_transactions(hashes).await?;
        let mut fetched = HashMap::new();
        for (hash, raw) in hashes.iter().zip(raws) {
            // Evicted or mined since the hash list was read.
            let Some(raw) = raw else { continue };
            match PendingTx::decode(raw) {
                Ok((_, tx)) => {
                    fetched.insert(*hash, tx);
                }
                Err(err) => warn!(tx = %hash_to_hex_str(hash), error = %err, "Undecodable mempool transaction"),
            }
        }
        Ok(fetched)
    }

    async fn lookup(&self, prevouts: Vec<Outpoint>) -> Result<Vec<Option<(HashX, u64)>>, MempoolError> {
        if prevouts.is_empty() {
            return Ok(Vec::new());
        }
        let utxos = self.utxos.clone();
        tokio::task::spawn_blocking(move || utxos.lookup_utxos(&prevouts))
            .await
            .map_err(|e| MempoolError::Task(e.to_string()))?
            .map_err(MempoolError::from)
    }

    fn take_new_touched(&self, live: &HashSet<TxHash>) -> BTreeSet<HashX> {
        let mut notified = self.notified.write();
        notified.retain(|hash| live.contains(hash));
        let pool = self.pool.read();
        let fresh: Vec<TxHash> = pool
            .tx_hashes()
            .filter(|hash| !notified.contains(*hash))
            .copied()
            .collect();
        let mut new_touched = BTreeSet::new();
        for hash in fresh {
            if let Some(tx) = pool.get(&hash) {
                new_touched.extend(tx.hashxs());
            }
            notified.insert(hash);
        }
        new_touched
    }

    /// Refresh on an interval, early after [`wake`](Self::wake), publishing
    /// touched hashXs until `shutdown` flips.
    pub async fn run(&self, events: Arc<dyn EventPublisher>, mut shutdown: watch::Receiver<bool>) {
        info!("Beginning processing of daemon mempool");
        let mut synced = false;
        loop {
            match self.refresh().await {
                Ok(refresh) => {
                    if !synced {
                        synced = true;
                        let pool = self.pool.read();
                        info!(txs = pool.len(), addresses = pool.address_count(), "Mempool synced");
                    }
                    if !refresh.touched.is_empty() {
                        events
                            .publish(HubEvent::MempoolRefreshed {
                                touched_hashxs: refresh.touched.into_iter().collect(),
                            })
                            .await;
                    }
                }
                Err(err) => warn!(error = %err, "Mempool refresh failed"),
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
                _ = self.wakeup.notified() => {}
                _ = tokio::time::sleep(self.config.refresh_interval) => {}
            }
        }
    }

    /// Refresh early, e.g. after a broadcast.
    pub fn wake(&self) {
        self.wakeup.notify_one();
    }

    pub fn len(&self) -> usize {
        self.pool.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.read().is_empty()
    }

    pub fn balance_delta(&self, hashx: &HashX) -> i64 {
        self.pool.read().balance_delta(hashx)
    }

    pub fn transaction_summaries(&self, hashx: &HashX) -> Vec<TxSummary> {
        self.pool.read().transaction_summaries(hashx)
    }

    pub fn unordered_utxos(&self, hashx: &HashX) -> Vec<MempoolUtxo> {
        self.pool.read().unordered_utxos(hashx)
    }

    pub fn potential_spends(&self, hashx: &HashX) -> BTreeSet<Outpoint> {
        self.pool.read().potential_spends(hashx)
    }

    pub fn status(&self, tx_hash: &TxHash) -> MempoolStatus {
        self.pool.read().status(tx_hash)
    }

    pub fn raw_transaction(&self, tx_hash: &TxHash) -> Option<Vec<u8>> {
        self.pool.read().get(tx_hash).map(|tx| tx.raw.clone())
    }

    pub fn compact_fee_histogram(&self) -> Vec<(u64, u64)> {
        self.histogram.read().clone()
    }
}
