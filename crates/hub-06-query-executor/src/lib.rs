//! # Query Executor (hub-06)
//!
//! Claim `resolve` and `search` for the session layer.
//!
//! | Component | Role |
//! |-----------|------|
//! | [`ClaimUrl`] | URL grammar and modifiers |
//! | [`SearchConstraints`] | validated search parameters |
//! | [`ClaimReader`] | synchronous query over one storage view |
//! | [`QueryExecutor`] | bounded worker pool, deadlines, result coalescing |
//! | [`MemorySearchIndex`] | BM25 full-text index |
//! | [`SearchIndexer`] | keeps the text index in step with block events |
//!
//! Results are `bincode`-encoded [`Outputs`] in base64, so they can be cached
//! once and shared by every session asking the same question.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{MemorySearchIndex, SearchIndexer};
pub use domain::{
    ClaimMeta, ClaimReader, ClaimUrl, Deadline, OutputRow, Outputs, QueryError, ResolveErrorKind,
    SearchConstraints, UrlError,
};
pub use ports::{ClaimDocument, QueryApi, SearchIndex};
pub use service::{QueryConfig, QueryExecutor};
