pub mod daemon;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use daemon::{DaemonClient, DaemonClientConfig};
