//! # Ports
//!
//! - `inbound` - typed reader/writer traits over any raw key view
//! - `outbound` - the ordered key-value store and header store the host supplies

pub mod inbound;
pub mod outbound;
