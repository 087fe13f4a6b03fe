//! # Claim Hub
//!
//! Indexes blocks from the consensus daemon and serves wallets over
//! newline-delimited JSON-RPC.
//!
//! Configuration comes from the TOML file named by `HUB_CONFIG` and from
//! environment variables; see [`node_runtime::container::config`].

use anyhow::{bail, Context, Result};
use node_runtime::{init_tracing, HubConfig, HubRuntime};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let config = HubConfig::load().context("loading configuration")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        network = %config.network.net,
        db = %config.storage.db_directory.display(),
        "Starting claim hub"
    );

    let mut runtime = HubRuntime::from_config(&config)?;
    runtime.start().await?;
    info!("Hub is running. Press Ctrl+C to stop.");

    let fatal = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for Ctrl-C")?;
            info!("Shutdown requested");
            false
        }
        _ = runtime.halted() => {
            warn!("Stopping after a fatal error");
            true
        }
    };

    runtime.shutdown().await;
    if fatal {
        bail!("hub halted after a fatal error");
    }
    Ok(())
}
