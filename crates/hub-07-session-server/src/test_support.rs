//! A small in-memory hub for session tests: a block processor over an
//! in-memory database, a scripted daemon, a mempool index and a canned
//! query service.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use hub_01_codec::test_utils::{coinbase_tx, p2pkh_script, BlockBuilder};
use hub_01_codec::Transaction;
use hub_02_storage::{HeaderStore, HubDb, MemoryHeaderStore};
use hub_03_claimtrie::ClaimTrieEngine;
use hub_04_block_processor::{BlockProcessor, MemoryDaemon};
use hub_05_mempool::{MempoolConfig, MempoolIndex};
use hub_06_query_executor::{QueryApi, QueryError};
use serde_json::{Map, Value};
use shared_types::{hashx_from_payment_script, BlockHash, HashX, Height, Network, ZERO_HASH};

use crate::domain::config::SessionConfig;
use crate::service::{HubBackend, SessionManager};

pub(crate) fn addr(seed: u8) -> (Vec<u8>, HashX) {
    let script = p2pkh_script([seed; 20]);
    let hashx = hashx_from_payment_script(&script);
    (script, hashx)
}

/// Echoes its input so tests can see what reached the query layer.
pub(crate) struct EchoQuery;

#[async_trait]
impl QueryApi for EchoQuery {
    async fn resolve(&self, urls: Vec<String>) -> Result<Arc<str>, QueryError> {
        Ok(Arc::from(format!("resolved:{}", urls.join(","))))
    }

    async fn search(&self, params: Map<String, Value>) -> Result<Arc<str>, QueryError> {
        if params.contains_key("hang") {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        if params.contains_key("slow") {
            return Err(QueryError::Timeout { ms: 0 });
        }
        if params.contains_key("bogus") {
            return Err(QueryError::UnknownConstraint("bogus".into()));
        }
        Ok(Arc::from(format!("searched:{}", params.len())))
    }
}

pub(crate) struct Hub {
    pub manager: Arc<SessionManager>,
    pub processor: BlockProcessor,
    pub daemon: Arc<MemoryDaemon>,
    pub mempool: Arc<MempoolIndex>,
    tip: BlockHash,
}

impl Hub {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(configure: impl FnOnce(&mut SessionConfig)) -> Self {
        let db = Arc::new(HubDb::in_memory(10));
        let headers: Arc<dyn HeaderStore> = Arc::new(MemoryHeaderStore::new());
        let processor = BlockProcessor::new(db.clone(), headers.clone(), ClaimTrieEngine::default());
        let daemon = Arc::new(MemoryDaemon::new());
        let mempool = Arc::new(MempoolIndex::new(
            daemon.clone(),
            db.clone(),
            MempoolConfig::default(),
        ));
        let backend = HubBackend {
            db,
            headers,
            mempool: mempool.clone(),
            daemon: daemon.clone(),
            query: Arc::new(EchoQuery),
            network: Network::Regtest.params(),
        };
        let mut config = SessionConfig::default();
        configure(&mut config);
        let mut hub = Self {
            manager: Arc::new(SessionManager::new(backend, config)),
            processor,
            daemon,
            mempool,
            tip: ZERO_HASH,
        };
        hub.mine_to(&addr(0).0, 50_000);
        hub
    }

    /// Mine a block whose coinbase pays `value` to `script`.
    pub fn mine_to(&mut self, script: &[u8], value: u64) -> BTreeSet<HashX> {
        self.mine(script, value, vec![])
    }

    pub fn mine(&mut self, script: &[u8], value: u64, txs: Vec<Transaction>) -> BTreeSet<HashX> {
        let height = self.processor.next_height().unwrap();
        let block = BlockBuilder::new(self.tip)
            .with_transaction(coinbase_tx(height, value, script.to_vec()))
            .with_transactions(txs)
            .build();
        self.daemon.push_block(&block);
        let touched = self.processor.advance_block(&block.encode()).unwrap();
        self.tip = touched.block_hash;
        touched.hashxs
    }

    pub fn height(&self) -> Height {
        self.processor.height().unwrap().unwrap()
    }
}
