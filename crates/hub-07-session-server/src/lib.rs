//! # Session Server (hub-07)
//!
//! The wallet-facing side of the hub: newline-delimited JSON-RPC sessions
//! over TCP, address and header subscriptions, and notification fan-out.
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`SessionManager`] | Sessions, subscriptions, history cache, notifications |
//! | [`Session`] | Per-connection state, outgoing queue and rate limiter |
//! | `handlers` | Method dispatch over storage, mempool, daemon and queries |
//! | [`adapters::tcp`] | Listener, line framing and writer tasks |
//!
//! ## Concurrency
//!
//! Sessions are bucketed into groups by connection time. Each group runs
//! at most [`GROUP_CONCURRENCY`](domain::groups::GROUP_CONCURRENCY)
//! requests at once. A session whose outgoing queue fills is dropped
//! rather than buffering without bound.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
mod handlers;
pub mod ports;
pub mod service;
pub mod session;

#[cfg(test)]
mod test_support;

pub use adapters::{listen, serve};
pub use domain::{codes, ClientFilter, RpcError, SessionConfig, SessionError};
pub use handlers::{MAX_CHUNK_SIZE, MAX_SUBSCRIBE_BATCH};
pub use ports::SessionNotifier;
pub use service::{HubBackend, SessionManager};
pub use session::Session;
