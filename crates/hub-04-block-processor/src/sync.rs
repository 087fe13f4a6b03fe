//! # Chain Sync
//!
//! Keeps the hub at the daemon's tip.
//!
//! ## Tasks
//!
//! | Task | Role |
//! |------|------|
//! | [`Prefetcher`] | polls the daemon, fetches raw blocks in batches ahead of processing |
//! | [`SyncService`] | applies blocks one at a time, handles reorgs, publishes [`HubEvent`]s |
//!
//! Blocks are applied on the blocking pool and the service yields between
//! blocks, so session traffic keeps flowing during a long catch-up.
//!
//! ## Reorgs
//!
//! A fetched block whose parent is not the local tip starts a reorg: the
//! common ancestor is found by comparing local and daemon block hashes over
//! windows that double in size below the tip, the chain is rewound to it and
//! prefetching restarts from there. A rewind deeper than the reorg limit
//! stops the service with a fatal error.

use std::sync::Arc;
use std::time::Duration;

use hub_01_codec::header_prev_hash;
use shared_bus::{EventPublisher, HubEvent};
use shared_types::{Height, HEADER_SIZE};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::domain::errors::{BlockProcessorError, DaemonError};
use crate::domain::reorg::{first_difference, AncestorWindow};
use crate::domain::touched::{RewindSummary, TouchedSet};
use crate::ports::outbound::DaemonApi;
use crate::service::BlockProcessor;

/// Sync tuning.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Most blocks requested in one batch.
    pub batch_size: u32,
    /// Prefetched batches buffered ahead of processing.
    pub queue_depth: usize,
    /// Wait between daemon polls once caught up.
    pub polling_interval: Duration,
    /// Wait before retrying a block that failed for a non-fatal reason.
    pub retry_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            queue_depth: 4,
            polling_interval: Duration::from_secs(5),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Output of the prefetcher.
#[derive(Debug)]
pub enum Prefetched {
    /// Raw blocks at consecutive heights starting at `first`.
    Blocks { first: Height, raw: Vec<Vec<u8>> },
    /// Every block up to `daemon_height` has been sent.
    CaughtUp { daemon_height: Height },
}

/// Fetches blocks ahead of the processor.
pub struct Prefetcher<D: DaemonApi + ?Sized> {
    daemon: Arc<D>,
    config: SyncConfig,
}

impl<D: DaemonApi + ?Sized + 'static> Prefetcher<D> {
    pub fn new(daemon: Arc<D>, config: SyncConfig) -> Self {
        Self { daemon, config }
    }

    /// Start fetching from height `from`. Abort the handle to reset.
    pub fn spawn(&self, from: Height) -> (JoinHandle<()>, mpsc::Receiver<Prefetched>) {
        let (tx, rx) = mpsc::channel(self.config.queue_depth.max(1));
        let daemon = self.daemon.clone();
        let config = self.config.clone();
        let handle = tokio::spawn(async move {
            let mut next = from;
            let mut behind = true;
            loop {
                match fetch_batch(&*daemon, next, config.batch_size).await {
                    Ok(Some((first, raw))) => {
                        next = first + raw.len() as Height;
                        behind = true;
                        if tx.send(Prefetched::Blocks { first, raw }).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => {
                        if behind {
                            behind = false;
                            let daemon_height = daemon.cached_height().unwrap_or(next.saturating_sub(1));
                            if tx.send(Prefetched::CaughtUp { daemon_height }).await.is_err() {
                                return;
                            }
                        }
                        tokio::time::sleep(config.polling_interval).await;
                    }
                    Err(err) => {
                        info!(error = %err, "Ignoring daemon error while prefetching");
                        tokio::time::sleep(config.polling_interval).await;
                    }
                }
            }
        });
        (handle, rx)
    }
}

/// Fetch up to `batch_size` blocks from `next`; `None` when caught up.
async fn fetch_batch<D: DaemonApi + ?Sized>(
    daemon: &D,
    next: Height,
    batch_size: u32,
) -> Result<Option<(Height, Vec<Vec<u8>>)>, BlockProcessorError> {
    let daemon_height = daemon.height().await?;
    if next > daemon_height {
        return Ok(None);
    }
    let count = (daemon_height - next + 1).min(batch_size.max(1));
    let hashes = daemon.block_hashes(next, count).await?;
    let raw = daemon.raw_blocks(&hashes).await?;
    if raw.len() != hashes.len() {
        return Err(DaemonError::malformed(
            "getblock",
            format!("{} blocks for {} hashes", raw.len(), hashes.len()),
        )
        .into());
    }
    Ok(Some((next, raw)))
}

/// What processing one batch led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchOutcome {
    Advanced,
    /// The chain moved under the prefetcher; restart it.
    Reset,
}

/// The long-lived ingestion task.
pub struct SyncService<D: DaemonApi + ?Sized> {
    processor: Arc<BlockProcessor>,
    daemon: Arc<D>,
    events: Arc<dyn EventPublisher>,
    config: SyncConfig,
}

impl<D: DaemonApi + ?Sized + 'static> SyncService<D> {
    pub fn new(
        processor: Arc<BlockProcessor>,
        daemon: Arc<D>,
        events: Arc<dyn EventPublisher>,
        config: SyncConfig,
    ) -> Self {
        Self {
            processor,
            daemon,
            events,
            config,
        }
    }

    /// Sync until `shutdown` flips to true or a fatal error occurs.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), BlockProcessorError> {
        let prefetcher = Prefetcher::new(self.daemon.clone(), self.config.clone());
        let (mut handle, mut queue) = prefetcher.spawn(self.processor.next_height()?);
        let mut caught_up = false;
        info!(height = ?self.processor.height()?, "Block sync started");

        let result = loop {
            let item = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break Ok(());
                    }
                    continue;
                }
                item = queue.recv() => item,
            };
            let outcome = match item {
                Some(Prefetched::Blocks { first, raw }) => self.process_batch(first, raw).await,
                Some(Prefetched::CaughtUp { daemon_height }) => {
                    let height = self.processor.height()?.unwrap_or(0);
                    if !caught_up {
                        caught_up = true;
                        info!(height, daemon_height, "Caught up to daemon");
                    }
                    self.events.publish(HubEvent::CaughtUp { height }).await;
                    Ok(BatchOutcome::Advanced)
                }
                None => Ok(BatchOutcome::Reset),
            };
            match outcome {
                Ok(BatchOutcome::Advanced) => {}
                Ok(BatchOutcome::Reset) => {
                    handle.abort();
                    (handle, queue) = prefetcher.spawn(self.processor.next_height()?);
                }
                Err(err) if err.is_fatal() => {
                    error!(error = %err, "Block sync stopped");
                    self.events
                        .publish(HubEvent::CriticalError {
                            source: "block-processor".into(),
                            error: err.to_string(),
                        })
                        .await;
                    break Err(err);
                }
                Err(err) => {
                    warn!(error = %err, "Block failed, retrying");
                    handle.abort();
                    tokio::time::sleep(self.config.retry_delay).await;
                    (handle, queue) = prefetcher.spawn(self.processor.next_height()?);
                }
            }
        };
        handle.abort();
        info!("Block sync stopped");
        result
    }

    async fn process_batch(
        &self,
        first: Height,
        raw: Vec<Vec<u8>>,
    ) -> Result<BatchOutcome, BlockProcessorError> {
        if first != self.processor.next_height()? {
            return Ok(BatchOutcome::Reset);
        }
        for block in raw {
            let prev = block
                .get(..HEADER_SIZE)
                .and_then(|header| header_prev_hash(header).ok());
            if let Some(prev) = prev {
                if self.processor.detect_reorg(&prev)? {
                    self.reorg().await?;
                    return Ok(BatchOutcome::Reset);
                }
            }
            let touched = self.advance(block).await?;
            self.publish_block(touched).await;
            tokio::task::yield_now().await;
        }
        Ok(BatchOutcome::Advanced)
    }

    async fn advance(&self, raw: Vec<u8>) -> Result<TouchedSet, BlockProcessorError> {
        let processor = self.processor.clone();
        let height = processor.next_height()?;
        tokio::task::spawn_blocking(move || processor.advance_block(&raw))
            .await
            .map_err(|e| BlockProcessorError::Integrity {
                height,
                detail: format!("block task failed: {e}"),
            })?
    }

    async fn publish_block(&self, touched: TouchedSet) {
        for takeover in &touched.takeovers {
            info!(
                name = %takeover.name,
                height = takeover.height,
                to = ?takeover.to.map(|c| c.claim_id()),
                "Takeover"
            );
        }
        self.events
            .publish(HubEvent::BlockAdvanced {
                height: touched.height,
                block_hash: touched.block_hash,
                touched_hashxs: touched.hashxs.into_iter().collect(),
                touched_claims: touched.claims.into_iter().collect(),
            })
            .await;
    }

    /// Rewind to the last block shared with the daemon's chain.
    pub async fn reorg(&self) -> Result<RewindSummary, BlockProcessorError> {
        let Some(tip) = self.processor.height()? else {
            return Ok(RewindSummary::default());
        };
        info!(tip, "Chain reorganisation detected");
        let ancestor = self.common_ancestor(tip).await?;
        let processor = self.processor.clone();
        let summary = tokio::task::spawn_blocking(move || processor.rewind(ancestor))
            .await
            .map_err(|e| BlockProcessorError::Integrity {
                height: tip,
                detail: format!("rewind task failed: {e}"),
            })??;
        self.events
            .publish(HubEvent::ChainRewound {
                from_height: summary.from_height,
                to_height: summary.to_height,
                touched_hashxs: summary.hashxs.iter().copied().collect(),
                touched_claims: summary.claims.iter().copied().collect(),
            })
            .await;
        Ok(summary)
    }

    /// Highest height whose block hash the local chain shares with the
    /// daemon, searched in doubling windows below `tip`.
    async fn common_ancestor(&self, tip: Height) -> Result<Height, BlockProcessorError> {
        let headers = self.processor.headers();
        let mut window = AncestorWindow::first(tip);
        while let Some(w) = window {
            let local = headers.block_hashes(w.start, w.count);
            let remote = self.daemon.block_hashes(w.start, w.count).await?;
            let same = first_difference(&local, &remote);
            if same > 0 {
                // Heights `w.start .. w.start + same` agree.
                return Ok(w.start + same as Height - 1);
            }
            window = w.widen();
        }
        Err(BlockProcessorError::Integrity {
            height: tip,
            detail: "no block in common with the daemon, genesis differs".into(),
        })
    }
}
