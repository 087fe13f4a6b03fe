//! # Claim-Hub Test Suite
//!
//! Cross-crate tests that need more than one subsystem at a time.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── benchmarks/       # Criterion workloads per subsystem
//! │   ├── hub_01_codec.rs
//! │   ├── hub_04_block_processor.rs
//! │   └── hub_06_query.rs
//! │
//! └── integration/      # Scenarios across storage, trie, sync and sessions
//!     ├── chain.rs      # Deterministic block builder and an applying node
//!     ├── claimtrie_scenarios.rs
//!     ├── reorg_replay.rs
//!     ├── query_coalescing.rs
//!     └── end_to_end.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p hub-tests
//!
//! # By category
//! cargo test -p hub-tests integration::claimtrie_scenarios
//! cargo test -p hub-tests integration::reorg_replay
//!
//! # Benchmarks
//! cargo bench -p hub-tests
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

pub mod benchmarks;
pub mod integration;
