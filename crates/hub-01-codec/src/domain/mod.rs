//! # Domain Layer
//!
//! Pure encode/decode logic. No I/O, no shared state.
//!
//! ## Modules
//!
//! - `primitives` - byte reader/writer, compact-size integers
//! - `transaction` - transactions with optional witness data
//! - `header` - 112-byte block headers
//! - `block` - header plus transactions
//! - `merkle` - merkle roots and branches
//! - `script` - output/input script templates
//! - `claim` - claim value envelopes
//! - `errors` - codec and script errors

pub mod block;
pub mod claim;
pub mod errors;
pub mod header;
pub mod merkle;
pub mod primitives;
pub mod script;
pub mod transaction;
