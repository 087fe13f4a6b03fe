//! # Subsystem Container
//!
//! Configuration and the assembled subsystem instances.

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, HubConfig};
pub use subsystems::HubSubsystems;
