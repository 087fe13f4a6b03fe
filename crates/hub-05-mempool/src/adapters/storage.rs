//! [`UtxoLookup`] over the hub database.

use hub_02_storage::{HubDb, StorageError, UtxoReader};
use shared_types::{HashX, Outpoint};

use crate::ports::UtxoLookup;

impl UtxoLookup for HubDb {
    fn lookup_utxos(&self, prevouts: &[Outpoint]) -> Result<Vec<Option<(HashX, u64)>>, StorageError> {
        let view = self.snapshot();
        prevouts
            .iter()
            .map(|prevout| {
                Ok(view
                    .get_utxo(prevout)?
                    .map(|entry| (entry.hashx, entry.value)))
            })
            .collect()
    }
}
