//! # Claim Trie (hub-03)
//!
//! Decides, block by block, which claim controls each name.
//!
//! ## Rules
//!
//! | Rule | Detail |
//! |------|--------|
//! | Effective amount | claim amount plus every live support |
//! | Trending amount | supports confirmed within the last 300 blocks |
//! | Activation delay | `min(4032, (height - last_takeover) / 32)` blocks; none for a name nobody controls |
//! | Takeover | highest effective amount among active claims; on an exact tie the incumbent stays |
//! | Abandon | spending a claim's outpoint without a same-name update deletes it and its supports |
//! | Expiration | treated as an abandon at the expiration height |
//!
//! The engine writes through [`ClaimStore`], normally the block transaction
//! of `hub-02-storage`, so a block's claim changes commit or roll back with
//! its UTXO changes.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::changes::{ClaimBlockSummary, ClaimOutput, ClaimTx, Takeover};
pub use domain::errors::ClaimTrieError;
pub use domain::invariants::{check_invariants, check_name, InvariantViolation};
pub use domain::ordering::{pick_winner, rank};
pub use domain::params::{EngineParams, MAX_ACTIVATION_DELAY, TRENDING_BLOCKS};
pub use ports::outbound::ClaimStore;
pub use service::{BlockClaimState, ClaimTrieEngine};
