pub mod indexer;
pub mod memory_index;

pub use indexer::{document_for, SearchIndexer};
pub use memory_index::MemorySearchIndex;
