use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

/// Client names refused at `server.version`.
///
/// A regular expression matched at the start of the client name.
#[derive(Debug, Clone, Default)]
pub struct ClientFilter {
    pattern: Option<Regex>,
}

impl ClientFilter {
    /// Compile `raw`. An empty pattern refuses nobody.
    pub fn parse(raw: &str) -> Result<Self, regex::Error> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self {
            pattern: Some(Regex::new(&format!("^(?:{raw})"))?),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
    }

    pub fn matches(&self, client: &str) -> bool {
        self.pattern.as_ref().is_some_and(|re| re.is_match(client))
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub listen: SocketAddr,
    /// Address subscriptions across all sessions.
    pub max_subscriptions: usize,
    /// Address subscriptions of one session.
    pub max_session_subs: usize,
    /// Idle time after which a session is closed.
    pub session_timeout: Duration,
    /// Largest response line; also bounds history length.
    pub max_send: usize,
    /// Largest request line.
    pub max_receive: usize,
    pub requests_per_second: u32,
    pub request_burst: u32,
    pub history_cache_size: usize,
    /// Outgoing lines buffered per session before it is dropped.
    pub outgoing_queue: usize,
    pub banner_file: Option<PathBuf>,
    pub description: String,
    pub donation_address: String,
    pub drop_client: ClientFilter,
    pub server_version: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 50001),
            max_subscriptions: 10_000,
            max_session_subs: 50_000,
            session_timeout: Duration::from_secs(600),
            max_send: 1_000_000,
            max_receive: 1_000_000,
            requests_per_second: 100,
            request_burst: 200,
            history_cache_size: 1_000,
            outgoing_queue: 1_024,
            banner_file: None,
            description: String::new(),
            donation_address: String::new(),
            drop_client: ClientFilter::default(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl SessionConfig {
    /// Longest history returned for one address. A history row is about
    /// 97 bytes of JSON.
    pub fn history_limit(&self) -> usize {
        (self.max_send / 97).max(1)
    }
}
