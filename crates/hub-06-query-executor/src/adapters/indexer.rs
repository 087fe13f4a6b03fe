//! Keeps a [`SearchIndex`] in step with the claim store by re-reading every
//! claim a block or rewind touched.

use std::sync::Arc;

use hub_02_storage::{ClaimRecord, ClaimTrieReader, HubDb, StorageError};
use shared_types::ClaimHash;
use tracing::{debug, info};

use crate::ports::{ClaimDocument, SearchIndex};

/// Minimum length of a printable run taken from a claim's payload.
const MIN_TEXT_RUN: usize = 3;

/// Searchable text of a claim: its name with separators as spaces, plus
/// the printable runs of its metadata payload.
pub fn document_for(claim: &ClaimRecord) -> ClaimDocument {
    let mut text = claim.original_name.replace(['-', '_'], " ");
    let mut run = String::new();
    for byte in &claim.value {
        let c = char::from(*byte);
        if c.is_ascii_graphic() || c == ' ' {
            run.push(c);
            continue;
        }
        if run.trim().len() >= MIN_TEXT_RUN {
            text.push(' ');
            text.push_str(run.trim());
        }
        run.clear();
    }
    if run.trim().len() >= MIN_TEXT_RUN {
        text.push(' ');
        text.push_str(run.trim());
    }
    ClaimDocument {
        claim_hash: claim.claim_hash,
        text,
    }
}

pub struct SearchIndexer {
    db: Arc<HubDb>,
    index: Arc<dyn SearchIndex>,
}

impl SearchIndexer {
    pub fn new(db: Arc<HubDb>, index: Arc<dyn SearchIndex>) -> Self {
        Self { db, index }
    }

    /// Index every live claim.
    pub fn rebuild(&self) -> Result<usize, StorageError> {
        let claims = self.db.snapshot().all_claims()?;
        for claim in &claims {
            self.index.upsert(document_for(claim));
        }
        info!(claims = claims.len(), "Search index built");
        Ok(claims.len())
    }

    /// Re-index `touched`: live claims are replaced, gone ones removed.
    pub fn apply(&self, touched: &[ClaimHash]) -> Result<(), StorageError> {
        let view = self.db.snapshot();
        for claim_hash in touched {
            match view.get_claim(claim_hash)? {
                Some(claim) => self.index.upsert(document_for(&claim)),
                None => self.index.remove(claim_hash),
            }
        }
        debug!(claims = touched.len(), "Search index updated");
        Ok(())
    }
}
