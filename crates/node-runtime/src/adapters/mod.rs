//! # Adapter Implementations
//!
//! Concrete backends the runtime plugs into the subsystem ports.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  node-runtime adapters                                   │
//! │    RocksDbStore ──implements──> hub-02 KeyValueStore     │
//! │    DiskSpace    ──startup check of the data directory    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The daemon client, headers file and TCP transport live in their own
//! subsystem crates.

pub mod storage;

pub use storage::*;
