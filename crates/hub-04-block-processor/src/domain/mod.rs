pub mod errors;
pub mod reorg;
pub mod touched;

pub use errors::{BlockProcessorError, DaemonError};
pub use reorg::{first_difference, AncestorWindow};
pub use touched::{BlockStats, RewindSummary, TouchedSet};
