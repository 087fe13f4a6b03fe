//! # Outbound Ports
//!
//! The full-text search backend. It only ranks: every hit is re-read from
//! the claim store, which stays authoritative for claim state.

use shared_types::ClaimHash;

/// A claim as the text index sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimDocument {
    pub claim_hash: ClaimHash,
    pub text: String,
}

pub trait SearchIndex: Send + Sync {
    /// Insert or replace the document for a claim.
    fn upsert(&self, document: ClaimDocument);

    fn remove(&self, claim_hash: &ClaimHash);

    /// Claims matching `query`, best first, with their relevance scores.
    fn search(&self, query: &str) -> Vec<(ClaimHash, f64)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
