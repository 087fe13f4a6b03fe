//! # Adapters
//!
//! - `headers` - flat headers file and its in-memory twin
//! - `lock` - exclusive lock on the data directory

pub mod headers;
pub mod lock;
