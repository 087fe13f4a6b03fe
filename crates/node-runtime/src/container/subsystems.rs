//! # Subsystem Container
//!
//! Holds every subsystem instance, built in dependency order:
//!
//! ```text
//! Level 0: Storage (hub-02), Event bus, Daemon client (hub-04)
//! Level 1: Block processor (hub-04, with the hub-03 engine), Mempool (hub-05)
//! Level 2: Search index + Query executor (hub-06)
//! Level 3: Session manager (hub-07)
//! ```
//!
//! All instances are `Arc`-shared; the tasks started by
//! [`HubRuntime`](crate::runtime::HubRuntime) hold clones.

use std::sync::Arc;

use anyhow::{Context, Result};
use hub_02_storage::HubStorage;
use hub_03_claimtrie::{ClaimTrieEngine, EngineParams};
use hub_04_block_processor::{BlockProcessor, DaemonApi, DaemonClient, SyncService};
use hub_05_mempool::MempoolIndex;
use hub_06_query_executor::{MemorySearchIndex, QueryExecutor, SearchIndex, SearchIndexer};
use hub_07_session_server::{HubBackend, SessionManager};
use shared_bus::{EventPublisher, InMemoryEventBus};
use tracing::info;

use crate::adapters::open_storage;
use crate::container::config::{ConfigError, HubConfig};

pub struct HubSubsystems {
    pub storage: HubStorage,
    pub bus: Arc<InMemoryEventBus>,
    pub daemon: Arc<dyn DaemonApi>,
    pub processor: Arc<BlockProcessor>,
    pub mempool: Arc<MempoolIndex>,
    pub indexer: Arc<SearchIndexer>,
    pub query: Arc<QueryExecutor>,
    pub sessions: Arc<SessionManager>,
    pub sync: Arc<SyncService<dyn DaemonApi>>,
}

impl HubSubsystems {
    /// Open on-disk storage and connect to the configured daemon.
    pub fn build(config: &HubConfig) -> Result<Self> {
        let storage = open_storage(config).context("opening storage")?;
        let daemon = DaemonClient::new(config.daemon.client_config())
            .context("creating daemon client")?;
        Self::assemble(config, storage, Arc::new(daemon)).context("wiring subsystems")
    }

    /// Wire the subsystems over already-open storage and a daemon.
    pub fn assemble(
        config: &HubConfig,
        storage: HubStorage,
        daemon: Arc<dyn DaemonApi>,
    ) -> Result<Self, ConfigError> {
        let network = config.network.params();
        info!(
            network = %network.network,
            reorg_limit = network.reorg_limit,
            "Assembling subsystems"
        );
        let bus = Arc::new(InMemoryEventBus::new());

        let processor = Arc::new(BlockProcessor::new(
            storage.db.clone(),
            storage.headers.clone(),
            ClaimTrieEngine::new(EngineParams::default()),
        ));
        let sync = Arc::new(SyncService::new(
            processor.clone(),
            daemon.clone(),
            bus.clone() as Arc<dyn EventPublisher>,
            config.daemon.sync_config(),
        ));
        let mempool = Arc::new(MempoolIndex::new(
            daemon.clone(),
            storage.db.clone(),
            config.mempool.index_config(),
        ));

        let index: Arc<dyn SearchIndex> = Arc::new(MemorySearchIndex::new());
        let indexer = Arc::new(SearchIndexer::new(storage.db.clone(), index.clone()));
        let query = Arc::new(QueryExecutor::new(
            storage.db.clone(),
            index,
            config.query.executor_config(),
        ));

        let backend = HubBackend {
            db: storage.db.clone(),
            headers: storage.headers.clone(),
            mempool: mempool.clone(),
            daemon: daemon.clone(),
            query: query.clone(),
            network,
        };
        let sessions = Arc::new(SessionManager::new(
            backend,
            config.session.server_config()?,
        ));

        Ok(Self {
            storage,
            bus,
            daemon,
            processor,
            mempool,
            indexer,
            query,
            sessions,
            sync,
        })
    }
}
