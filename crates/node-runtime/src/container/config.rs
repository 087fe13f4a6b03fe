//! # Hub Configuration
//!
//! Unified configuration for every subsystem, loaded in two layers:
//!
//! 1. An optional TOML file named by `HUB_CONFIG`. Missing sections and
//!    fields take their defaults.
//! 2. Environment variables, which override the file.
//!
//! ## Environment
//!
//! | Variable | Field |
//! |----------|-------|
//! | `DB_DIRECTORY` | `storage.db_directory` |
//! | `DAEMON_URL` | `daemon.url` (comma-separated for failover) |
//! | `NET` | `network.net` |
//! | `REORG_LIMIT` | `network.reorg_limit` |
//! | `HOST`, `TCP_PORT` | `session.host`, `session.tcp_port` |
//! | `MAX_QUERY_WORKERS`, `QUERY_TIMEOUT_MS` | `query.*` |
//! | `MAX_SUBSCRIPTIONS`, `MAX_SESSION_SUBS` | `session.*` |
//! | `SESSION_TIMEOUT` | `session.session_timeout` (seconds) |
//! | `MAX_SEND`, `MAX_RECEIVE` | `session.*` (bytes) |
//! | `BANNER_FILE`, `DONATION_ADDRESS`, `DROP_CLIENT` | `session.*` |

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use hub_04_block_processor::{DaemonClientConfig, SyncConfig};
use hub_07_session_server::ClientFilter;
use serde::{Deserialize, Serialize};
use shared_types::{Network, NetworkParams};
use thiserror::Error;

/// Environment variable naming the TOML file.
pub const CONFIG_PATH_VAR: &str = "HUB_CONFIG";

/// Smallest accepted `max_send`; a header chunk must fit.
pub const MIN_MAX_SEND: usize = 1_000;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("No daemon URL configured; set DAEMON_URL")]
    MissingDaemonUrl,

    #[error("Invalid listen host {0:?}")]
    InvalidHost(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("max_send must be at least {MIN_MAX_SEND} bytes, got {0}")]
    MaxSendTooSmall(usize),

    #[error("Invalid DROP_CLIENT pattern {pattern:?}: {message}")]
    InvalidDropClient { pattern: String, message: String },
}

/// Complete hub configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub daemon: DaemonConfig,
    pub session: SessionConfig,
    pub query: QueryConfig,
    pub mempool: MempoolConfig,
}

impl HubConfig {
    /// File named by `HUB_CONFIG` (if set), then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        if let Some(dir) = env.raw("DB_DIRECTORY") {
            self.storage.db_directory = PathBuf::from(dir);
        }
        if let Some(url) = env.raw("DAEMON_URL") {
            self.daemon.url = url;
        }
        env.parse("NET", &mut self.network.net)?;
        if let Some(limit) = env.parsed::<u32>("REORG_LIMIT")? {
            self.network.reorg_limit = Some(limit);
        }

        if let Some(host) = env.raw("HOST") {
            self.session.host = host;
        }
        env.parse("TCP_PORT", &mut self.session.tcp_port)?;
        env.parse("MAX_SUBSCRIPTIONS", &mut self.session.max_subscriptions)?;
        env.parse("MAX_SESSION_SUBS", &mut self.session.max_session_subs)?;
        env.parse("SESSION_TIMEOUT", &mut self.session.session_timeout)?;
        env.parse("MAX_SEND", &mut self.session.max_send)?;
        env.parse("MAX_RECEIVE", &mut self.session.max_receive)?;
        if let Some(path) = env.raw("BANNER_FILE") {
            self.session.banner_file = Some(PathBuf::from(path));
        }
        if let Some(address) = env.raw("DONATION_ADDRESS") {
            self.session.donation_address = address;
        }
        if let Some(patterns) = env.raw("DROP_CLIENT") {
            self.session.drop_client = patterns;
        }

        env.parse("MAX_QUERY_WORKERS", &mut self.query.max_query_workers)?;
        env.parse("QUERY_TIMEOUT_MS", &mut self.query.query_timeout_ms)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daemon.url.trim().is_empty() {
            return Err(ConfigError::MissingDaemonUrl);
        }
        self.session.listen_addr()?;
        self.session.drop_client()?;
        if self.session.max_send < MIN_MAX_SEND {
            return Err(ConfigError::MaxSendTooSmall(self.session.max_send));
        }
        let positive = [
            ("network.reorg_limit", self.network.params().reorg_limit as u64),
            ("session.max_receive", self.session.max_receive as u64),
            ("session.max_subscriptions", self.session.max_subscriptions as u64),
            ("session.max_session_subs", self.session.max_session_subs as u64),
            ("session.session_timeout", self.session.session_timeout),
            ("query.max_query_workers", self.query.max_query_workers as u64),
            ("query.query_timeout_ms", self.query.query_timeout_ms),
            ("mempool.refresh_interval_ms", self.mempool.refresh_interval_ms),
            ("daemon.batch_size", self.daemon.batch_size as u64),
        ];
        match positive.iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(ConfigError::Zero { field: *field }),
            None => Ok(()),
        }
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn raw(&self, var: &str) -> Option<String> {
        (self.0)(var).filter(|value| !value.trim().is_empty())
    }

    fn parsed<T: FromStr>(&self, var: &'static str) -> Result<Option<T>, ConfigError> {
        match self.raw(var) {
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidEnv { var, value }),
            None => Ok(None),
        }
    }

    fn parse<T: FromStr>(&self, var: &'static str, field: &mut T) -> Result<(), ConfigError> {
        if let Some(value) = self.parsed(var)? {
            *field = value;
        }
        Ok(())
    }
}

/// Ledger selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub net: Network,
    /// Overrides the network's reorg limit.
    pub reorg_limit: Option<u32>,
}

impl NetworkConfig {
    pub fn params(&self) -> NetworkParams {
        let mut params = self.net.params();
        if let Some(limit) = self.reorg_limit {
            params.reorg_limit = limit;
        }
        params
    }
}

/// Where and how the database is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_directory: PathBuf,
    pub block_cache_mb: usize,
    pub write_buffer_mb: usize,
    /// fsync every commit.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_directory: PathBuf::from("./db"),
            block_cache_mb: 256,
            write_buffer_mb: 64,
            sync_writes: true,
        }
    }
}

/// Consensus daemon connection and sync pacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Comma-separated URLs in failover order.
    pub url: String,
    pub max_workqueue: usize,
    pub request_timeout_secs: u64,
    pub init_retry_ms: u64,
    pub max_retry_ms: u64,
    /// Blocks fetched per prefetch batch.
    pub batch_size: u32,
    pub polling_interval_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let client = DaemonClientConfig::default();
        let sync = SyncConfig::default();
        Self {
            url: String::new(),
            max_workqueue: client.max_workqueue,
            request_timeout_secs: client.request_timeout.as_secs(),
            init_retry_ms: client.init_retry.as_millis() as u64,
            max_retry_ms: client.max_retry.as_millis() as u64,
            batch_size: sync.batch_size,
            polling_interval_ms: sync.polling_interval.as_millis() as u64,
        }
    }
}

impl DaemonConfig {
    pub fn client_config(&self) -> DaemonClientConfig {
        DaemonClientConfig {
            max_workqueue: self.max_workqueue,
            init_retry: Duration::from_millis(self.init_retry_ms),
            max_retry: Duration::from_millis(self.max_retry_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..DaemonClientConfig::default()
        }
        .with_url_list(&self.url)
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            batch_size: self.batch_size,
            polling_interval: Duration::from_millis(self.polling_interval_ms),
            ..SyncConfig::default()
        }
    }
}

/// Wallet-facing listener and session limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub host: String,
    pub tcp_port: u16,
    pub max_subscriptions: usize,
    pub max_session_subs: usize,
    /// Seconds.
    pub session_timeout: u64,
    pub max_send: usize,
    pub max_receive: usize,
    pub requests_per_second: u32,
    pub request_burst: u32,
    pub banner_file: Option<PathBuf>,
    pub description: String,
    pub donation_address: String,
    pub drop_client: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let defaults = hub_07_session_server::SessionConfig::default();
        Self {
            host: defaults.listen.ip().to_string(),
            tcp_port: defaults.listen.port(),
            max_subscriptions: defaults.max_subscriptions,
            max_session_subs: defaults.max_session_subs,
            session_timeout: defaults.session_timeout.as_secs(),
            max_send: defaults.max_send,
            max_receive: defaults.max_receive,
            requests_per_second: defaults.requests_per_second,
            request_burst: defaults.request_burst,
            banner_file: None,
            description: String::new(),
            donation_address: String::new(),
            drop_client: String::new(),
        }
    }
}

impl SessionConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.tcp_port))
    }

    fn drop_client(&self) -> Result<ClientFilter, ConfigError> {
        ClientFilter::parse(&self.drop_client).map_err(|err| ConfigError::InvalidDropClient {
            pattern: self.drop_client.clone(),
            message: err.to_string(),
        })
    }

    pub fn server_config(&self) -> Result<hub_07_session_server::SessionConfig, ConfigError> {
        Ok(hub_07_session_server::SessionConfig {
            listen: self.listen_addr()?,
            max_subscriptions: self.max_subscriptions,
            max_session_subs: self.max_session_subs,
            session_timeout: Duration::from_secs(self.session_timeout),
            max_send: self.max_send,
            max_receive: self.max_receive,
            requests_per_second: self.requests_per_second,
            request_burst: self.request_burst,
            banner_file: self.banner_file.clone(),
            description: self.description.clone(),
            donation_address: self.donation_address.clone(),
            drop_client: self.drop_client()?,
            ..hub_07_session_server::SessionConfig::default()
        })
    }
}

/// Resolve and search execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub max_query_workers: usize,
    pub query_timeout_ms: u64,
    pub cache_ttl_ms: u64,
    pub search_cache_size: usize,
    pub resolve_cache_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let defaults = hub_06_query_executor::QueryConfig::default();
        Self {
            max_query_workers: defaults.max_workers,
            query_timeout_ms: defaults.timeout.as_millis() as u64,
            cache_ttl_ms: defaults.cache_ttl.as_millis() as u64,
            search_cache_size: defaults.search_cache_size,
            resolve_cache_size: defaults.resolve_cache_size,
        }
    }
}

impl QueryConfig {
    pub fn executor_config(&self) -> hub_06_query_executor::QueryConfig {
        hub_06_query_executor::QueryConfig {
            max_workers: self.max_query_workers,
            timeout: Duration::from_millis(self.query_timeout_ms),
            cache_ttl: Duration::from_millis(self.cache_ttl_ms),
            search_cache_size: self.search_cache_size,
            resolve_cache_size: self.resolve_cache_size,
        }
    }
}

/// Mempool polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    pub refresh_interval_ms: u64,
    pub fetch_chunk: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        let defaults = hub_05_mempool::MempoolConfig::default();
        Self {
            refresh_interval_ms: defaults.refresh_interval.as_millis() as u64,
            fetch_chunk: defaults.fetch_chunk,
        }
    }
}

impl MempoolConfig {
    pub fn index_config(&self) -> hub_05_mempool::MempoolConfig {
        hub_05_mempool::MempoolConfig {
            refresh_interval: Duration::from_millis(self.refresh_interval_ms),
            fetch_chunk: self.fetch_chunk,
            ..hub_05_mempool::MempoolConfig::default()
        }
    }
}
