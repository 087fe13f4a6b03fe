//! # Session Manager
//!
//! Owns every open session, the address subscription index and the history
//! cache, and turns "these hashXs changed" into client notifications.
//!
//! ## Request path
//!
//! ```text
//! line ──▶ throttle ──▶ parse ──▶ group permit ──▶ dispatch ──▶ response line
//! ```
//!
//! ## Notification path
//!
//! | Step | Action |
//! |------|--------|
//! | 1 | Drop cached history of every touched hashX |
//! | 2 | New height: send the tip header to header subscribers |
//! | 3 | Compute the status of each touched, subscribed hashX once |
//! | 4 | Send it to each subscriber whose last status differs |
//!
//! ## Limits
//!
//! - `max_session_subs` address subscriptions per session
//! - `max_subscriptions` across the server
//! - `max_receive` bytes per request line, `max_send` per response line
//! - a governor token bucket per session

use std::collections::{BTreeSet, HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use hub_01_codec::BlockHeader;
use hub_02_storage::{HeaderStore, HistoryItem, HubDb, UtxoReader};
use hub_04_block_processor::DaemonApi;
use hub_05_mempool::MempoolIndex;
use hub_06_query_executor::QueryApi;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::{json, Value};
use shared_types::{hash_to_hex_str, HashX, Height, NetworkParams};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::domain::config::SessionConfig;
use crate::domain::errors::RpcError;
use crate::domain::groups::{consolidate, GroupAssigner, GROUP_WINDOW};
use crate::domain::protocol::{encode_line, notification, parse_message, response, Incoming, Request};
use crate::domain::status;
use crate::ports::SessionNotifier;
use crate::session::{AddressSub, Session};

/// Everything the request handlers read from.
#[derive(Clone)]
pub struct HubBackend {
    pub db: Arc<HubDb>,
    pub headers: Arc<dyn HeaderStore>,
    pub mempool: Arc<MempoolIndex>,
    pub daemon: Arc<dyn DaemonApi>,
    pub query: Arc<dyn QueryApi>,
    pub network: NetworkParams,
}

/// Confirmed histories keyed by hashX.
///
/// Every invalidation bumps `generation`. A reader records the generation
/// before going to the database and may only store its result if no
/// invalidation happened in between.
struct HistoryCache {
    entries: LruCache<HashX, Arc<Vec<HistoryItem>>>,
    generation: u64,
}

impl HistoryCache {
    fn new(size: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(size),
            generation: 0,
        }
    }

    /// The cached history, or the generation a fresh read must be tagged with.
    fn lookup(&mut self, hashx: &HashX) -> Result<Arc<Vec<HistoryItem>>, u64> {
        self.entries.get(hashx).cloned().ok_or(self.generation)
    }

    fn insert(&mut self, hashx: HashX, generation: u64, history: Arc<Vec<HistoryItem>>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.entries.put(hashx, history);
        true
    }

    fn invalidate<'a>(&mut self, touched: impl IntoIterator<Item = &'a HashX>) {
        for hashx in touched {
            self.entries.pop(hashx);
        }
        self.generation += 1;
    }
}

pub struct SessionManager {
    pub(crate) backend: HubBackend,
    pub(crate) config: SessionConfig,
    sessions: DashMap<u64, Arc<Session>>,
    subscribers: DashMap<HashX, HashSet<u64>>,
    subscription_count: AtomicUsize,
    history_cache: Mutex<HistoryCache>,
    groups: Mutex<GroupAssigner>,
    notified_height: Mutex<Option<Height>>,
    started: Instant,
    next_id: AtomicU64,
}

impl SessionManager {
    pub fn new(backend: HubBackend, config: SessionConfig) -> Self {
        let cache_size = NonZeroUsize::new(config.history_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            backend,
            config,
            sessions: DashMap::new(),
            subscribers: DashMap::new(),
            subscription_count: AtomicUsize::new(0),
            history_cache: Mutex::new(HistoryCache::new(cache_size)),
            groups: Mutex::new(GroupAssigner::new(GROUP_WINDOW)),
            notified_height: Mutex::new(None),
            started: Instant::now(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Register a connection. Lines queued for it arrive on the receiver.
    pub fn open_session(&self, peer: String) -> (Arc<Session>, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let group = self.groups.lock().assign(self.started.elapsed());
        let (tx, rx) = mpsc::channel(self.config.outgoing_queue.max(1));
        let session = Arc::new(Session::new(
            id,
            peer,
            group,
            tx,
            self.config.requests_per_second,
            self.config.request_burst,
        ));
        self.sessions.insert(id, session.clone());
        debug!(session = id, peer = %session.peer, "Session opened");
        (session, rx)
    }

    /// Forget a session and its subscriptions.
    pub fn close_session(&self, id: u64) {
        let Some((_, session)) = self.sessions.remove(&id) else {
            return;
        };
        session.close();
        let subs: Vec<HashX> = session.state.lock().subs.drain().map(|(hashx, _)| hashx).collect();
        for hashx in &subs {
            self.remove_subscriber(hashx, id);
        }
        self.subscription_count.fetch_sub(subs.len(), Ordering::Relaxed);
        debug!(
            session = id,
            requests = session.request_count(),
            subscriptions = subs.len(),
            "Session closed"
        );
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscription_count.load(Ordering::Relaxed)
    }

    /// Answer one incoming line. `None` when nothing is owed to the client.
    pub async fn handle_line(&self, session: &Arc<Session>, line: &str) -> Option<String> {
        session.touch();
        if let Some(wait) = session.throttle() {
            debug!(session = session.id, wait_ms = wait.as_millis() as u64, "Throttling session");
            tokio::time::sleep(wait).await;
        }

        let reply = match parse_message(line) {
            Err(err) => Some(response(Value::Null, Err(err))),
            Ok(Incoming::Single(parsed)) => self.handle_parsed(session, parsed).await,
            Ok(Incoming::Batch(items)) => {
                let mut replies = Vec::with_capacity(items.len());
                for parsed in items {
                    if let Some(reply) = self.handle_parsed(session, parsed).await {
                        replies.push(reply);
                    }
                }
                (!replies.is_empty()).then(|| Value::Array(replies))
            }
        }?;

        let line = encode_line(&reply);
        if line.len() > self.config.max_send {
            warn!(session = session.id, size = line.len(), "Response too large");
            let err = RpcError::bad_request(format!(
                "response too large (over {} bytes)",
                self.config.max_send
            ));
            let id = reply.get("id").cloned().unwrap_or(Value::Null);
            return Some(encode_line(&response(id, Err(err))));
        }
        Some(line)
    }

    async fn handle_parsed(
        &self,
        session: &Arc<Session>,
        parsed: Result<Request, (Value, RpcError)>,
    ) -> Option<Value> {
        match parsed {
            Ok(request) => {
                let result = self.handle_request(session, &request).await;
                request.id.map(|id| response(id, result))
            }
            Err((id, err)) => Some(response(id, Err(err))),
        }
    }

    /// Run one request under the session group's concurrency limit.
    pub async fn handle_request(
        &self,
        session: &Arc<Session>,
        request: &Request,
    ) -> Result<Value, RpcError> {
        let group = session.group();
        let _permit = group
            .semaphore
            .acquire()
            .await
            .map_err(|_| RpcError::internal("server shutting down"))?;
        let result = self.dispatch(session, request).await;
        if let Err(err) = &result {
            debug!(session = session.id, method = %request.method, code = err.code, "Request failed");
        }
        result
    }

    // ---------------------------------------------------------------------
    // History and status
    // ---------------------------------------------------------------------

    /// Confirmed history of `hashx`, bounded by what fits in one response.
    pub(crate) fn history(&self, hashx: &HashX) -> Result<Arc<Vec<HistoryItem>>, RpcError> {
        let generation = match self.history_cache.lock().lookup(hashx) {
            Ok(history) => return Ok(history),
            Err(generation) => generation,
        };
        let history = self.backend.db.get_history(hashx)?;
        if history.len() > self.config.history_limit() {
            return Err(RpcError::bad_request(format!(
                "history too large: {} transactions",
                history.len()
            )));
        }
        let history = Arc::new(history);
        if !self.history_cache.lock().insert(*hashx, generation, history.clone()) {
            debug!(generation, "History changed during read, not cached");
        }
        Ok(history)
    }

    pub(crate) fn address_status(&self, hashx: &HashX) -> Result<Option<String>, RpcError> {
        let history = self.history(hashx)?;
        let mempool = self.backend.mempool.transaction_summaries(hashx);
        Ok(status::address_status(&history, &mempool))
    }

    // ---------------------------------------------------------------------
    // Subscriptions
    // ---------------------------------------------------------------------

    /// Subscribe `session` to `hashx` and return its current status.
    pub(crate) fn subscribe(
        &self,
        session: &Session,
        hashx: HashX,
        alias: String,
    ) -> Result<Option<String>, RpcError> {
        let status = self.address_status(&hashx)?;
        {
            let mut state = session.state.lock();
            if let Some(sub) = state.subs.get_mut(&hashx) {
                sub.status = status.clone();
                sub.alias = alias;
                return Ok(status);
            }
            if state.subs.len() >= self.config.max_session_subs {
                return Err(RpcError::bad_request(format!(
                    "too many subscriptions in session: limit {}",
                    self.config.max_session_subs
                )));
            }
            let limit = self.config.max_subscriptions;
            self.subscription_count
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                    (count < limit).then_some(count + 1)
                })
                .map_err(|_| {
                    RpcError::bad_request(format!("server subscription limit {limit} reached"))
                })?;
            state.subs.insert(
                hashx,
                AddressSub {
                    alias,
                    status: status.clone(),
                },
            );
        }
        self.subscribers.entry(hashx).or_default().insert(session.id);
        Ok(status)
    }

    pub(crate) fn unsubscribe(&self, session: &Session, hashx: &HashX) -> bool {
        if session.state.lock().subs.remove(hashx).is_none() {
            return false;
        }
        self.remove_subscriber(hashx, session.id);
        self.subscription_count.fetch_sub(1, Ordering::Relaxed);
        true
    }

    fn remove_subscriber(&self, hashx: &HashX, id: u64) {
        if let Some(mut ids) = self.subscribers.get_mut(hashx) {
            ids.remove(&id);
        }
        self.subscribers.remove_if(hashx, |_, ids| ids.is_empty());
    }

    // ---------------------------------------------------------------------
    // Headers
    // ---------------------------------------------------------------------

    /// The header at `height`, as hex with its height or decoded.
    pub(crate) fn header_payload(&self, height: Height, raw: bool) -> Result<Value, RpcError> {
        let bytes = self.backend.headers.header(height)?;
        if raw {
            return Ok(json!({"hex": hex::encode(&bytes), "height": height}));
        }
        let header = BlockHeader::decode(&bytes)
            .map_err(|err| RpcError::internal(format!("stored header {height}: {err}")))?;
        Ok(json!({
            "block_height": height,
            "version": header.version,
            "prev_block_hash": hash_to_hex_str(&header.prev_block_hash),
            "merkle_root": hash_to_hex_str(&header.merkle_root),
            "claim_trie_root": hash_to_hex_str(&header.claim_trie_root),
            "timestamp": header.timestamp,
            "bits": header.bits,
            "nonce": header.nonce,
        }))
    }

    pub(crate) fn tip_height(&self) -> Result<Height, RpcError> {
        self.backend
            .headers
            .tip_height()
            .ok_or_else(|| RpcError::internal("no headers yet"))
    }

    // ---------------------------------------------------------------------
    // Notifications
    // ---------------------------------------------------------------------

    fn notify_headers(&self, height: Height) {
        let mut payloads: [Option<Value>; 2] = [None, None];
        for entry in self.sessions.iter() {
            let session = entry.value();
            let Some(raw) = session.state.lock().headers else {
                continue;
            };
            let slot = &mut payloads[usize::from(raw)];
            if slot.is_none() {
                match self.header_payload(height, raw) {
                    Ok(payload) => *slot = Some(payload),
                    Err(err) => {
                        warn!(height, error = %err, "Cannot load tip header for notification");
                        return;
                    }
                }
            }
            if let Some(payload) = slot {
                let note = notification("blockchain.headers.subscribe", json!([payload]));
                if session.send(&note).is_err() {
                    debug!(session = session.id, "Dropped header notification");
                }
            }
        }
    }

    fn notify_addresses(&self, touched: &BTreeSet<HashX>) -> usize {
        let mut by_session: HashMap<u64, Vec<HashX>> = HashMap::new();
        for hashx in touched {
            if let Some(ids) = self.subscribers.get(hashx) {
                for id in ids.iter() {
                    by_session.entry(*id).or_default().push(*hashx);
                }
            }
        }

        let mut statuses: HashMap<HashX, Option<String>> = HashMap::new();
        let mut sent = 0;
        for (id, hashxs) in by_session {
            let Some(session) = self.sessions.get(&id).map(|s| s.clone()) else {
                continue;
            };
            for hashx in hashxs {
                let status = match statuses.get(&hashx) {
                    Some(status) => status.clone(),
                    None => match self.address_status(&hashx) {
                        Ok(status) => {
                            statuses.insert(hashx, status.clone());
                            status
                        }
                        Err(err) => {
                            warn!(error = %err, "Cannot compute address status");
                            continue;
                        }
                    },
                };
                let Some(alias) = session.update_status(&hashx, &status) else {
                    continue;
                };
                let method = if alias.len() == 64 {
                    "blockchain.scripthash.subscribe"
                } else {
                    "blockchain.address.subscribe"
                };
                if session.send(&notification(method, json!([alias, status]))).is_ok() {
                    sent += 1;
                }
            }
        }
        sent
    }

    // ---------------------------------------------------------------------
    // Housekeeping
    // ---------------------------------------------------------------------

    /// Close sessions idle past the timeout and merge small groups.
    pub fn reap_stale(&self) -> usize {
        let timeout = self.config.session_timeout;
        let stale: Vec<u64> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_for() > timeout || entry.value().is_closed())
            .map(|entry| *entry.key())
            .collect();
        for id in &stale {
            self.close_session(*id);
        }
        if !stale.is_empty() {
            info!(closed = stale.len(), remaining = self.sessions.len(), "Closed stale sessions");
        }
        self.consolidate_groups();
        stale.len()
    }

    fn consolidate_groups(&self) {
        let mut sizes: HashMap<u64, usize> = HashMap::new();
        for entry in self.sessions.iter() {
            *sizes.entry(entry.value().group().gid).or_default() += 1;
        }
        let Some((moved, target)) = consolidate(&sizes) else {
            return;
        };
        let Some(group) = self
            .sessions
            .iter()
            .map(|entry| entry.value().group())
            .find(|group| group.gid == target)
        else {
            return;
        };
        for entry in self.sessions.iter() {
            if moved.contains(&entry.value().group().gid) {
                entry.value().set_group(group.clone());
            }
        }
        debug!(groups = moved.len(), target, "Merged small session groups");
    }

    /// Reap every tenth of the session timeout until shutdown.
    pub async fn run_reaper(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = (self.config.session_timeout / 10).max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.reap_stale();
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("Session reaper stopped");
    }
}

#[async_trait]
impl SessionNotifier for SessionManager {
    async fn notify(&self, height: Height, touched: &BTreeSet<HashX>) {
        self.history_cache.lock().invalidate(touched);

        let new_height = {
            let mut notified = self.notified_height.lock();
            let changed = *notified != Some(height);
            *notified = Some(height);
            changed
        };
        if new_height {
            self.notify_headers(height);
        }

        let sent = self.notify_addresses(touched);
        debug!(height, touched = touched.len(), sent, "Notified sessions");
    }
}
