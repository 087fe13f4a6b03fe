//! # Node Runtime Library
//!
//! The hub binary's building blocks, exposed for integration tests. The
//! entry point is `main.rs`.
//!
//! | Module | Role |
//! |--------|------|
//! | [`container`] | [`HubConfig`] and the assembled [`HubSubsystems`] |
//! | [`adapters`] | RocksDB key-value store, storage opening |
//! | [`wiring`] | Bus event routing to sessions and caches |
//! | [`runtime`] | Task lifecycle and shutdown |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod container;
pub mod runtime;
pub mod wiring;

pub use container::{ConfigError, HubConfig, HubSubsystems};
pub use runtime::HubRuntime;
pub use wiring::NotificationRouter;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber: `RUST_LOG` filter (default `info`),
/// with targets and thread ids.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))
}
