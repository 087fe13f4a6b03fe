//! # Block Processor (hub-04)
//!
//! Turns daemon blocks into index state.
//!
//! ## Per block
//!
//! 1. Decode and check the parent is the local tip.
//! 2. Spend inputs, add outputs, record address history.
//! 3. Feed claim operations through the claim trie engine.
//! 4. Append the header and commit everything with one undo record.
//!
//! A failed block leaves no trace. [`BlockProcessor::rewind`] undoes blocks
//! down to a common ancestor, never deeper than the reorg limit.
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`BlockProcessor`] | synchronous apply and rewind |
//! | [`SyncService`] | async loop: prefetch, reorg handling, events |
//! | [`DaemonClient`] | JSON-RPC client with retries and failover |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;
pub mod sync;

pub use adapters::{DaemonClient, DaemonClientConfig};
#[cfg(any(test, feature = "test-utils"))]
pub use adapters::memory::MemoryDaemon;
pub use domain::{
    first_difference, AncestorWindow, BlockProcessorError, BlockStats, DaemonError,
    RewindSummary, TouchedSet,
};
pub use ports::DaemonApi;
pub use service::BlockProcessor;
pub use sync::{Prefetched, Prefetcher, SyncConfig, SyncService};
