//! Per-connection state.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use shared_types::HashX;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::domain::errors::SessionError;
use crate::domain::groups::SessionGroup;
use crate::domain::protocol::encode_line;
use crate::domain::version::{protocol_min, ProtocolVersion};

/// An address subscription: the name the client used and the last status
/// sent for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AddressSub {
    pub alias: String,
    pub status: Option<String>,
}

#[derive(Debug)]
pub(crate) struct SessionState {
    pub client: String,
    pub protocol: ProtocolVersion,
    pub version_sent: bool,
    /// `Some(raw)` once `blockchain.headers.subscribe` was called.
    pub headers: Option<bool>,
    pub subs: HashMap<HashX, AddressSub>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            client: "unknown".into(),
            protocol: protocol_min(),
            version_sent: false,
            headers: None,
            subs: HashMap::new(),
        }
    }
}

pub struct Session {
    pub id: u64,
    pub peer: String,
    group: RwLock<Arc<SessionGroup>>,
    outgoing: mpsc::Sender<String>,
    closed: watch::Sender<bool>,
    close_after_send: AtomicBool,
    limiter: DefaultDirectRateLimiter,
    last_recv: Mutex<Instant>,
    requests: AtomicU64,
    pub(crate) state: Mutex<SessionState>,
}

impl Session {
    pub(crate) fn new(
        id: u64,
        peer: String,
        group: Arc<SessionGroup>,
        outgoing: mpsc::Sender<String>,
        requests_per_second: u32,
        burst: u32,
    ) -> Self {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(per_second);
        let (closed, _) = watch::channel(false);
        Self {
            id,
            peer,
            group: RwLock::new(group),
            outgoing,
            closed,
            close_after_send: AtomicBool::new(false),
            limiter: RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst)),
            last_recv: Mutex::new(Instant::now()),
            requests: AtomicU64::new(0),
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn group(&self) -> Arc<SessionGroup> {
        self.group.read().clone()
    }

    pub(crate) fn set_group(&self, group: Arc<SessionGroup>) {
        *self.group.write() = group;
    }

    /// Queue `value` as one line. A full queue means the client stopped
    /// reading; the session is closed.
    pub fn send(&self, value: &Value) -> Result<(), SessionError> {
        self.send_line(encode_line(value))
    }

    /// Queue an already encoded line.
    pub(crate) fn send_line(&self, line: String) -> Result<(), SessionError> {
        self.outgoing.try_send(line).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                debug!(session = self.id, "Outgoing queue full, closing");
                self.close();
                SessionError::Backlogged
            }
            mpsc::error::TrySendError::Closed(_) => SessionError::Closed,
        })
    }

    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the server decides to drop the session.
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    /// Close once the response being prepared has been queued.
    pub(crate) fn close_after_send(&self) {
        self.close_after_send.store(true, Ordering::Relaxed);
    }

    pub(crate) fn wants_close(&self) -> bool {
        self.close_after_send.load(Ordering::Relaxed)
    }

    pub(crate) fn touch(&self) {
        *self.last_recv.lock() = Instant::now();
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> Duration {
        self.last_recv.lock().elapsed()
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// How long to hold the next request back, if at all.
    pub(crate) fn throttle(&self) -> Option<Duration> {
        match self.limiter.check() {
            Ok(()) => None,
            Err(not_until) => Some(not_until.wait_time_from(DefaultClock::default().now())),
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.state.lock().subs.len()
    }

    pub fn client(&self) -> String {
        self.state.lock().client.clone()
    }

    /// Record `status` for `hashx`. Returns the alias to notify under when
    /// the status differs from the one last sent.
    pub(crate) fn update_status(&self, hashx: &HashX, status: &Option<String>) -> Option<String> {
        let mut state = self.state.lock();
        let sub = state.subs.get_mut(hashx)?;
        if &sub.status == status {
            return None;
        }
        sub.status = status.clone();
        Some(sub.alias.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(queue: usize) -> (Session, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(queue);
        let session = Session::new(1, "peer".into(), Arc::new(SessionGroup::new(0)), tx, 1, 2);
        (session, rx)
    }

    #[tokio::test]
    async fn test_full_queue_closes_session() {
        let (session, mut rx) = session(1);
        session.send(&json!(1)).unwrap();
        assert!(matches!(session.send(&json!(2)), Err(SessionError::Backlogged)));
        assert!(session.is_closed());
        assert_eq!(rx.recv().await.unwrap(), "1\n");
    }

    #[test]
    fn test_throttle_after_burst() {
        let (session, _rx) = session(4);
        assert_eq!(session.throttle(), None);
        assert_eq!(session.throttle(), None);
        assert!(session.throttle().is_some());
    }

    #[test]
    fn test_update_status_reports_changes_only() {
        let (session, _rx) = session(4);
        let hashx = HashX([1; 11]);
        assert_eq!(session.update_status(&hashx, &Some("a".into())), None);
        session.state.lock().subs.insert(
            hashx,
            AddressSub {
                alias: "addr".into(),
                status: None,
            },
        );
        assert_eq!(session.update_status(&hashx, &Some("a".into())), Some("addr".into()));
        assert_eq!(session.update_status(&hashx, &Some("a".into())), None);
    }
}
