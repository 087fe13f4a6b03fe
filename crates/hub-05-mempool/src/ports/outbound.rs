//! What the mempool needs from the confirmed store.

use hub_02_storage::StorageError;
use shared_types::{HashX, Outpoint};

/// Confirmed UTXO lookups for resolving mempool inputs.
pub trait UtxoLookup: Send + Sync {
    /// Owner and value of each prevout, `None` when it is spent or unknown.
    /// All lookups observe one consistent snapshot.
    fn lookup_utxos(&self, prevouts: &[Outpoint]) -> Result<Vec<Option<(HashX, u64)>>, StorageError>;
}
