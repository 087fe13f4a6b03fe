//! # Shared Types Crate
//!
//! Chain entities, identifiers and network parameters used by every hub
//! subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: identifiers such as [`HashX`], [`ClaimHash`]
//!   and [`Outpoint`] are defined once, here.
//! - **No Global Registry**: network selection is an explicit
//!   [`NetworkParams`] value passed at construction time.
//! - **Byte Order**: hashes are stored in internal (little-endian) order and
//!   rendered reversed, as block explorers and wallets expect.

pub mod entities;
pub mod errors;
pub mod hashing;
pub mod network;

pub use entities::*;
pub use errors::*;
pub use hashing::*;
pub use network::*;
