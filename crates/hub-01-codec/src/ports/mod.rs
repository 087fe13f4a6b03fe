//! # Ports
//!
//! - `inbound` - the codec API other subsystems call

pub mod inbound;
