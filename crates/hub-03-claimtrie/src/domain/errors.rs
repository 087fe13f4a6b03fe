use hub_02_storage::StorageError;
use shared_types::{ClaimHash, Height};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaimTrieError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The trie disagrees with the claim rows. Never transient.
    #[error("Claim trie integrity violation at height {height}: {detail}")]
    Integrity { height: Height, detail: String },

    #[error("Claim {0} vanished while processing its name")]
    MissingClaim(ClaimHash),
}
