//! # Query Executor
//!
//! Runs claim queries on a bounded pool of blocking workers so the session
//! event loop never waits on storage.
//!
//! ## Request path
//!
//! 1. Parameters are validated on the caller's task; bad requests never
//!    reach a worker.
//! 2. The result cache coalesces identical requests (see [`ResultCache`]).
//! 3. The computing caller takes a worker permit and moves it into a
//!    `spawn_blocking` job, so the pool stays bounded even when the caller
//!    stops waiting.
//! 4. The job reads one consistent [`ReadView`] and checks its
//!    [`Deadline`] between rows. The caller also stops waiting once the
//!    deadline passes.
//!
//! | Method    | Cache                  |
//! |-----------|------------------------|
//! | `resolve` | `resolve_cache_size`   |
//! | `search`  | `search_cache_size`    |

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hub_02_storage::{HubDb, ReadView};
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::domain::{ClaimReader, Deadline, Outputs, QueryError, ResultCache, SearchConstraints};
use crate::ports::{QueryApi, SearchIndex};

#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Queries running at once.
    pub max_workers: usize,
    /// Budget of one query, queueing included.
    pub timeout: Duration,
    /// How long an identical query reuses a finished result.
    pub cache_ttl: Duration,
    pub search_cache_size: usize,
    pub resolve_cache_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(2),
            search_cache_size: 16_384,
            resolve_cache_size: 65_536,
        }
    }
}

pub struct QueryExecutor {
    db: Arc<HubDb>,
    index: Arc<dyn SearchIndex>,
    workers: Arc<Semaphore>,
    search_cache: ResultCache,
    resolve_cache: ResultCache,
    timeout: Duration,
    executions: AtomicU64,
}

impl QueryExecutor {
    pub fn new(db: Arc<HubDb>, index: Arc<dyn SearchIndex>, config: QueryConfig) -> Self {
        Self {
            db,
            index,
            workers: Arc::new(Semaphore::new(config.max_workers.max(1))),
            search_cache: ResultCache::new(config.search_cache_size, config.cache_ttl),
            resolve_cache: ResultCache::new(config.resolve_cache_size, config.cache_ttl),
            timeout: config.timeout,
            executions: AtomicU64::new(0),
        }
    }

    /// Drop cached results; called whenever the claim store moves.
    pub fn invalidate(&self) {
        self.search_cache.clear();
        self.resolve_cache.clear();
    }

    /// Queries that actually ran on a worker.
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Refuse new queries. Running ones finish.
    pub fn close(&self) {
        self.workers.close();
    }

    async fn submit<F>(&self, job: F) -> Result<Arc<str>, QueryError>
    where
        F: FnOnce(&ReadView<'_>, &dyn SearchIndex, Deadline) -> Result<Outputs, QueryError>
            + Send
            + 'static,
    {
        let deadline = Deadline::after(self.timeout);
        let run = async {
            let permit = self
                .workers
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| QueryError::Closed)?;
            deadline.check()?;
            self.executions.fetch_add(1, Ordering::Relaxed);
            let db = self.db.clone();
            let index = self.index.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let view = db.snapshot();
                job(&view, index.as_ref(), deadline)?.to_base64()
            });
            match handle.await {
                Ok(encoded) => encoded.map(Arc::from),
                Err(err) => Err(QueryError::Internal(err.to_string())),
            }
        };
        let result = match tokio::time::timeout(deadline.remaining(), run).await {
            Ok(result) => result,
            Err(_) => Err(deadline.timeout_error()),
        };
        if let Err(err @ QueryError::Timeout { .. }) = &result {
            warn!(error = %err, "Query abandoned");
        }
        result
    }
}

fn cache_key(method: &str, params: &impl serde::Serialize) -> Result<String, QueryError> {
    let params = serde_json::to_string(params).map_err(|e| QueryError::Internal(e.to_string()))?;
    Ok(format!("{method}:{params}"))
}

#[async_trait]
impl QueryApi for QueryExecutor {
    async fn resolve(&self, urls: Vec<String>) -> Result<Arc<str>, QueryError> {
        let key = cache_key("resolve", &urls)?;
        self.resolve_cache
            .get_or_compute(key, || {
                debug!(urls = urls.len(), "Resolving");
                self.submit(move |view, index, deadline| {
                    ClaimReader::new(view, index, deadline).resolve(&urls)
                })
            })
            .await
    }

    async fn search(&self, params: Map<String, Value>) -> Result<Arc<str>, QueryError> {
        let constraints = SearchConstraints::from_params(&params)?;
        let key = cache_key("search", &params)?;
        self.search_cache
            .get_or_compute(key, || {
                debug!(?constraints, "Searching");
                self.submit(move |view, index, deadline| {
                    ClaimReader::new(view, index, deadline).search(&constraints)
                })
            })
            .await
    }
}
