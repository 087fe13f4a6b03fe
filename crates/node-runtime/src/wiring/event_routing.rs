//! # Notification Routing
//!
//! Turns bus events into cache invalidation and session notifications.
//!
//! ## Event Flow
//!
//! ```text
//! SYNC SERVICE (hub-04)              MEMPOOL (hub-05)
//!     │                                  │
//!     ├── BlockAdvanced / ChainRewound   └── MempoolRefreshed
//!     │          │                                 │
//!     │          ▼                                 │
//!     │   search index update (hub-06)             │
//!     │   query cache invalidation                 │
//!     │   mempool refresh ──> extra touched        │
//!     │          │                                 │
//!     │          └──────────────┬──────────────────┘
//!     │                         ▼
//!     │              SESSION NOTIFIER (hub-07)
//!     │
//!     └── CriticalError ──> halt the runtime
//! ```
//!
//! Events are handled one at a time, so a block's notifications always go
//! out after its index update and before the next block's.

use std::collections::BTreeSet;
use std::sync::Arc;

use hub_02_storage::HeaderStore;
use hub_05_mempool::MempoolIndex;
use hub_06_query_executor::{QueryExecutor, SearchIndexer};
use hub_07_session_server::SessionNotifier;
use shared_bus::{HubEvent, Subscription};
use shared_types::{ClaimHash, HashX, Height};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub struct NotificationRouter {
    sessions: Arc<dyn SessionNotifier>,
    mempool: Arc<MempoolIndex>,
    query: Arc<QueryExecutor>,
    indexer: Arc<SearchIndexer>,
    headers: Arc<dyn HeaderStore>,
    halt: Arc<watch::Sender<bool>>,
    caught_up: bool,
}

impl NotificationRouter {
    pub fn new(
        sessions: Arc<dyn SessionNotifier>,
        mempool: Arc<MempoolIndex>,
        query: Arc<QueryExecutor>,
        indexer: Arc<SearchIndexer>,
        headers: Arc<dyn HeaderStore>,
        halt: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self {
            sessions,
            mempool,
            query,
            indexer,
            headers,
            halt,
            caught_up: false,
        }
    }

    /// Route events until `shutdown` flips or the bus closes.
    pub async fn run(mut self, mut events: Subscription, mut shutdown: watch::Receiver<bool>) {
        loop {
            let event = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.handle(event).await;
        }
        debug!("Notification router stopped");
    }

    pub async fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::BlockAdvanced {
                height,
                touched_hashxs,
                touched_claims,
                ..
            } => {
                self.chain_changed(height, touched_hashxs, &touched_claims).await;
            }
            HubEvent::ChainRewound {
                from_height,
                to_height,
                touched_hashxs,
                touched_claims,
            } => {
                info!(from_height, to_height, "Chain rewound, notifying sessions");
                self.chain_changed(to_height, touched_hashxs, &touched_claims).await;
            }
            HubEvent::MempoolRefreshed { touched_hashxs } => {
                let Some(height) = self.headers.tip_height() else {
                    return;
                };
                let touched: BTreeSet<HashX> = touched_hashxs.into_iter().collect();
                self.sessions.notify(height, &touched).await;
            }
            HubEvent::CaughtUp { height } => {
                if !self.caught_up {
                    self.caught_up = true;
                    info!(height, "Serving notifications at daemon tip");
                }
            }
            HubEvent::CriticalError { source, error } => {
                error!(source = %source, error = %error, "Critical error, halting");
                self.halt.send_replace(true);
            }
        }
    }

    async fn chain_changed(&self, height: Height, hashxs: Vec<HashX>, claims: &[ClaimHash]) {
        if let Err(err) = self.indexer.apply(claims) {
            warn!(error = %err, "Search index update failed");
        }
        self.query.invalidate();

        let mut touched: BTreeSet<HashX> = hashxs.into_iter().collect();
        // Catch-up blocks are old news; the mempool only matters at the tip.
        if self.caught_up {
            match self.mempool.refresh().await {
                Ok(refresh) => touched.extend(refresh.touched),
                Err(err) => warn!(error = %err, "Mempool refresh after block failed"),
            }
        }
        self.sessions.notify(height, &touched).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hub_01_codec::test_utils::{
        claim_script, coinbase_tx, p2pkh_script, stream_value, BlockBuilder, TxBuilder,
    };
    use hub_01_codec::Transaction;
    use hub_02_storage::HubStorage;
    use hub_03_claimtrie::ClaimTrieEngine;
    use hub_04_block_processor::{BlockProcessor, MemoryDaemon, TouchedSet};
    use hub_05_mempool::MempoolConfig;
    use hub_06_query_executor::{MemorySearchIndex, QueryConfig, SearchIndex};
    use parking_lot::Mutex;
    use shared_types::{hashx_from_payment_script, BlockHash, Outpoint, ZERO_HASH};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Height, BTreeSet<HashX>)>>);

    #[async_trait]
    impl SessionNotifier for Recorder {
        async fn notify(&self, height: Height, touched: &BTreeSet<HashX>) {
            self.0.lock().push((height, touched.clone()));
        }
    }

    fn addr(seed: u8) -> (Vec<u8>, HashX) {
        let script = p2pkh_script([seed; 20]);
        (script.clone(), hashx_from_payment_script(&script))
    }

    struct Fixture {
        router: NotificationRouter,
        recorder: Arc<Recorder>,
        index: Arc<MemorySearchIndex>,
        daemon: Arc<MemoryDaemon>,
        processor: BlockProcessor,
        halted: watch::Receiver<bool>,
    }

    fn fixture() -> Fixture {
        let storage = HubStorage::in_memory(200);
        let daemon = Arc::new(MemoryDaemon::new());
        let processor = BlockProcessor::new(
            storage.db.clone(),
            storage.headers.clone(),
            ClaimTrieEngine::default(),
        );
        let index = Arc::new(MemorySearchIndex::new());
        let query = Arc::new(QueryExecutor::new(
            storage.db.clone(),
            index.clone(),
            QueryConfig::default(),
        ));
        let indexer = Arc::new(SearchIndexer::new(storage.db.clone(), index.clone()));
        let mempool = Arc::new(MempoolIndex::new(
            daemon.clone(),
            storage.db.clone(),
            MempoolConfig::default(),
        ));
        let recorder = Arc::new(Recorder::default());
        let (halt, halted) = watch::channel(false);
        let router = NotificationRouter::new(
            recorder.clone(),
            mempool,
            query,
            indexer,
            storage.headers.clone(),
            Arc::new(halt),
        );
        Fixture {
            router,
            recorder,
            index,
            daemon,
            processor,
            halted,
        }
    }

    impl Fixture {
        /// Mine a block paying its coinbase to `addr(1)`; also returns the
        /// coinbase outpoint.
        fn mine(&self, prev: BlockHash, txs: Vec<Transaction>) -> (TouchedSet, Outpoint) {
            let height = self.processor.next_height().unwrap();
            let block = BlockBuilder::new(prev)
                .with_transaction(coinbase_tx(height, 10_000, addr(1).0))
                .with_transactions(txs)
                .build();
            self.daemon.push_block(&block);
            let touched = self.processor.advance_block(&block.encode()).unwrap();
            (touched, Outpoint::new(block.transactions[0].txid(), 0))
        }
    }

    fn advanced(touched: &TouchedSet) -> HubEvent {
        HubEvent::BlockAdvanced {
            height: touched.height,
            block_hash: touched.block_hash,
            touched_hashxs: touched.hashxs.iter().copied().collect(),
            touched_claims: touched.claims.iter().copied().collect(),
        }
    }

    #[tokio::test]
    async fn test_block_notifies_its_touched_hashxs() {
        let mut fx = fixture();
        let (genesis, _) = fx.mine(ZERO_HASH, vec![]);
        fx.router.handle(advanced(&genesis)).await;

        let calls = fx.recorder.0.lock().clone();
        assert_eq!(calls, vec![(0, [addr(1).1].into())]);
    }

    #[tokio::test]
    async fn test_block_at_tip_adds_mempool_touched() {
        let mut fx = fixture();
        let (genesis, coinbase) = fx.mine(ZERO_HASH, vec![]);
        fx.daemon.add_mempool_tx(
            &TxBuilder::new().spend(coinbase).pay(9_000, addr(2).0).build(),
        );

        fx.router.handle(HubEvent::CaughtUp { height: 0 }).await;
        fx.router.handle(advanced(&genesis)).await;

        let calls = fx.recorder.0.lock().clone();
        assert_eq!(calls, vec![(0, [addr(1).1, addr(2).1].into())]);
    }

    #[tokio::test]
    async fn test_claims_reach_the_search_index() {
        let mut fx = fixture();
        let (genesis, coinbase) = fx.mine(ZERO_HASH, vec![]);
        let claim = TxBuilder::new()
            .spend(coinbase)
            .pay(5_000, claim_script("hello", &stream_value("Hello"), [3; 20]))
            .build();
        let (block, _) = fx.mine(genesis.block_hash, vec![claim]);
        assert!(!block.claims.is_empty());

        fx.router.handle(advanced(&block)).await;
        assert_eq!(fx.index.len(), 1);
    }

    #[tokio::test]
    async fn test_mempool_refresh_uses_header_tip() {
        let mut fx = fixture();
        fx.router
            .handle(HubEvent::MempoolRefreshed {
                touched_hashxs: vec![addr(4).1],
            })
            .await;
        // No headers yet, nothing to notify against.
        assert!(fx.recorder.0.lock().is_empty());

        fx.mine(ZERO_HASH, vec![]);
        fx.router
            .handle(HubEvent::MempoolRefreshed {
                touched_hashxs: vec![addr(4).1],
            })
            .await;
        assert_eq!(fx.recorder.0.lock().clone(), vec![(0, [addr(4).1].into())]);
    }

    #[tokio::test]
    async fn test_critical_error_halts() {
        let mut fx = fixture();
        fx.router
            .handle(HubEvent::CriticalError {
                source: "block-processor".into(),
                error: "reorg limit exceeded".into(),
            })
            .await;
        assert!(*fx.halted.borrow());
    }
}
