//! # Domain Layer
//!
//! - `params` - activation delay and trending window
//! - `ordering` - takeover ranking and tie-break
//! - `changes` - per-transaction inputs and per-block summaries
//! - `invariants` - consistency checks over the claim tables
//! - `errors` - engine errors

pub mod changes;
pub mod errors;
pub mod invariants;
pub mod ordering;
pub mod params;
