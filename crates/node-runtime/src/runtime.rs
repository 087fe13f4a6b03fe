//! # Hub Runtime
//!
//! Starts the long-lived tasks over an assembled [`HubSubsystems`] and
//! stops them through one `watch` channel.
//!
//! | Task | Runs |
//! |------|------|
//! | router | [`NotificationRouter::run`] |
//! | listener | `hub_07_session_server::serve` |
//! | reaper | `SessionManager::run_reaper` |
//! | mempool | `MempoolIndex::run` |
//! | sync | `SyncService::run` |
//!
//! The router subscribes before sync starts, so no block event is missed.
//! A sync failure or a `CriticalError` event flips the same channel that
//! Ctrl-C does.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use shared_bus::{EventFilter, EventPublisher};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::container::{HubConfig, HubSubsystems};
use crate::wiring::NotificationRouter;

/// How long each task gets to finish after shutdown is signalled.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct HubRuntime {
    subsystems: HubSubsystems,
    shutdown: Arc<watch::Sender<bool>>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    local_addr: Option<SocketAddr>,
}

impl HubRuntime {
    pub fn new(subsystems: HubSubsystems) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            subsystems,
            shutdown: Arc::new(shutdown),
            tasks: Vec::new(),
            local_addr: None,
        }
    }

    pub fn from_config(config: &HubConfig) -> Result<Self> {
        Ok(Self::new(HubSubsystems::build(config)?))
    }

    pub fn subsystems(&self) -> &HubSubsystems {
        &self.subsystems
    }

    /// Address the session listener bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub async fn start(&mut self) -> Result<()> {
        let hub = &self.subsystems;

        let indexer = hub.indexer.clone();
        let claims = tokio::task::spawn_blocking(move || indexer.rebuild())
            .await
            .context("search index task")?
            .context("building search index")?;

        let router = NotificationRouter::new(
            hub.sessions.clone(),
            hub.mempool.clone(),
            hub.query.clone(),
            hub.indexer.clone(),
            hub.storage.headers.clone(),
            self.shutdown.clone(),
        );
        let events = hub.bus.subscribe(EventFilter::all());

        let listen = hub.sessions.config().listen;
        let listener = TcpListener::bind(listen)
            .await
            .with_context(|| format!("binding session listener on {listen}"))?;
        self.local_addr = Some(listener.local_addr().context("reading listener address")?);

        let sessions = hub.sessions.clone();
        let mempool = hub.mempool.clone();
        let bus = hub.bus.clone() as Arc<dyn EventPublisher>;
        let sync = hub.sync.clone();
        let halt = self.shutdown.clone();

        self.spawn("router", |stop| router.run(events, stop));
        {
            let sessions = sessions.clone();
            self.spawn("listener", |stop| async move {
                if let Err(err) = hub_07_session_server::serve(sessions, listener, stop).await {
                    error!(error = %err, "Session listener failed");
                }
            });
        }
        self.spawn("reaper", |stop| sessions.run_reaper(stop));
        self.spawn("mempool", |stop| async move { mempool.run(bus, stop).await });
        self.spawn("sync", |stop| async move {
            if let Err(err) = sync.run(stop).await {
                error!(error = %err, "Block sync failed");
                halt.send_replace(true);
            }
        });

        info!(
            address = ?self.local_addr,
            indexed_claims = claims,
            tasks = self.tasks.len(),
            "Hub started"
        );
        Ok(())
    }

    fn spawn<F, Fut>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.shutdown.subscribe()));
        self.tasks.push((name, handle));
    }

    /// Resolves once shutdown has been requested from inside the hub.
    pub async fn halted(&self) {
        let mut stop = self.shutdown.subscribe();
        let _ = stop.wait_for(|stop| *stop).await;
    }

    pub fn is_halted(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Signal every task and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        for (name, task) in self.tasks.drain(..) {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => debug!(task = name, "Task stopped"),
                Ok(Err(err)) => error!(task = name, error = %err, "Task panicked"),
                Err(_) => warn!(task = name, "Task did not stop in time"),
            }
        }
        info!(sessions = self.subsystems.sessions.session_count(), "Hub stopped");
    }
}
