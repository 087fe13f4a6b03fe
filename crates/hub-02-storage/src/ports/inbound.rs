//! # Inbound Ports (Driving Ports)
//!
//! Typed access to the UTXO and claim-trie tables.
//!
//! Everything is layered on two raw traits: [`RawReader`] (point reads and
//! ordered prefix scans) and [`RawWriter`] (staged puts and deletes). The
//! typed traits are blanket-implemented, so a committed snapshot, a block
//! transaction with staged writes, and the database handle itself all expose
//! the same API.

use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{BlockHash, ClaimHash, HashX, Height, Outpoint, TxHash};

use crate::domain::entities::{
    ChainState, ClaimRecord, ClaimTrieEntry, HistoryItem, SupportRecord, TxLocation, UtxoEntry,
};
use crate::domain::errors::{encode_error, StorageError};
use crate::domain::keys::{KeyCursor, KeyPrefix};

/// Point reads and ordered prefix scans over the raw key space.
pub trait RawReader {
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Entries under `prefix`, ascending by key.
    fn scan_raw(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;
}

/// Staged mutations. Nothing is visible to other readers until the
/// owning transaction commits.
pub trait RawWriter: RawReader {
    fn put_raw(&mut self, key: Vec<u8>, value: Vec<u8>);

    fn delete_raw(&mut self, key: Vec<u8>);
}

fn decode<T: DeserializeOwned>(what: &'static str, bytes: &[u8]) -> Result<T, StorageError> {
    bincode::deserialize(bytes).map_err(|e| encode_error(what, e))
}

fn encode<T: Serialize>(what: &'static str, value: &T) -> Result<Vec<u8>, StorageError> {
    bincode::serialize(value).map_err(|e| encode_error(what, e))
}

fn corrupt(what: &'static str) -> StorageError {
    StorageError::Serialization {
        what,
        message: "unexpected value length".into(),
    }
}

fn hash32(what: &'static str, bytes: &[u8]) -> Result<[u8; 32], StorageError> {
    <[u8; 32]>::try_from(bytes).map_err(|_| corrupt(what))
}

// =============================================================================
// UTXO STORE
// =============================================================================

/// Read side of the UTXO store, confirmed transactions and chain state.
pub trait UtxoReader: RawReader {
    fn chain_state(&self) -> Result<Option<ChainState>, StorageError> {
        self.get_raw(&KeyPrefix::chain_state())?
            .map(|raw| decode("chain state", &raw))
            .transpose()
    }

    fn get_utxo(&self, outpoint: &Outpoint) -> Result<Option<UtxoEntry>, StorageError> {
        self.get_raw(&KeyPrefix::utxo(outpoint))?
            .map(|raw| UtxoEntry::from_bytes(&raw).ok_or_else(|| corrupt("utxo")))
            .transpose()
    }

    /// Unspent outputs paying `hashx`, ordered by outpoint.
    fn get_hashx_utxos(&self, hashx: &HashX) -> Result<Vec<(Outpoint, u64)>, StorageError> {
        self.scan_raw(&KeyPrefix::hashx_utxo_prefix(hashx))?
            .into_iter()
            .map(|(key, value)| {
                let mut cursor = KeyCursor::new(KeyPrefix::HashXUtxo, &key, 0);
                cursor.skip_hashx()?;
                let outpoint = cursor.outpoint()?;
                let value = <[u8; 8]>::try_from(value.as_slice())
                    .map_err(|_| corrupt("hashX utxo"))?;
                Ok((outpoint, u64::from_le_bytes(value)))
            })
            .collect()
    }

    /// Confirmed balance of `hashx`.
    fn get_balance(&self, hashx: &HashX) -> Result<u64, StorageError> {
        Ok(self
            .get_hashx_utxos(hashx)?
            .iter()
            .map(|(_, value)| *value)
            .sum())
    }

    /// Confirmed history of `hashx` in chain order.
    fn get_history(&self, hashx: &HashX) -> Result<Vec<HistoryItem>, StorageError> {
        self.scan_raw(&KeyPrefix::history_prefix(hashx))?
            .into_iter()
            .map(|(key, value)| {
                let mut cursor = KeyCursor::new(KeyPrefix::History, &key, 0);
                cursor.skip_hashx()?;
                let height = cursor.height()?;
                let position = cursor.position()?;
                Ok(HistoryItem {
                    tx_hash: hash32("history", &value)?,
                    height,
                    position,
                })
            })
            .collect()
    }

    fn get_tx_location(&self, tx_hash: &TxHash) -> Result<Option<TxLocation>, StorageError> {
        self.get_raw(&KeyPrefix::tx_location(tx_hash))?
            .map(|raw| TxLocation::from_bytes(&raw).ok_or_else(|| corrupt("tx location")))
            .transpose()
    }

    fn get_raw_tx(&self, tx_hash: &TxHash) -> Result<Option<Vec<u8>>, StorageError> {
        self.get_raw(&KeyPrefix::raw_tx(tx_hash))
    }

    /// Transaction hashes of the block at `height`, in block order.
    fn get_block_tx_hashes(&self, height: Height) -> Result<Option<Vec<TxHash>>, StorageError> {
        let Some(raw) = self.get_raw(&KeyPrefix::block_txs(height))? else {
            return Ok(None);
        };
        if raw.len() % 32 != 0 {
            return Err(corrupt("block tx hashes"));
        }
        raw.chunks_exact(32)
            .map(|chunk| hash32("block tx hashes", chunk))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

impl<T: RawReader + ?Sized> UtxoReader for T {}

/// Write side of the UTXO store.
pub trait UtxoWriter: RawWriter + UtxoReader {
    fn put_chain_state(&mut self, state: &ChainState) -> Result<(), StorageError> {
        let raw = encode("chain state", state)?;
        self.put_raw(KeyPrefix::chain_state(), raw);
        Ok(())
    }

    fn add_utxo(&mut self, outpoint: &Outpoint, entry: UtxoEntry) {
        self.put_raw(KeyPrefix::utxo(outpoint), entry.to_bytes().to_vec());
        self.put_raw(
            KeyPrefix::hashx_utxo(&entry.hashx, outpoint),
            entry.value.to_le_bytes().to_vec(),
        );
    }

    /// Remove an unspent output, returning it. `None` when the outpoint is
    /// unknown or was never indexed (unspendable outputs).
    fn spend_utxo(&mut self, outpoint: &Outpoint) -> Result<Option<UtxoEntry>, StorageError> {
        let Some(entry) = self.get_utxo(outpoint)? else {
            return Ok(None);
        };
        self.delete_raw(KeyPrefix::utxo(outpoint));
        self.delete_raw(KeyPrefix::hashx_utxo(&entry.hashx, outpoint));
        Ok(Some(entry))
    }

    fn add_history(&mut self, hashx: &HashX, location: TxLocation, tx_hash: &TxHash) {
        self.put_raw(
            KeyPrefix::history(hashx, location.height, location.position),
            tx_hash.to_vec(),
        );
    }

    fn put_tx(&mut self, tx_hash: &TxHash, location: TxLocation, raw: &[u8]) {
        self.put_raw(KeyPrefix::tx_location(tx_hash), location.to_bytes().to_vec());
        self.put_raw(KeyPrefix::raw_tx(tx_hash), raw.to_vec());
    }

    fn put_block_tx_hashes(&mut self, height: Height, tx_hashes: &[TxHash]) {
        let raw = tx_hashes.iter().flat_map(|h| h.iter().copied()).collect();
        self.put_raw(KeyPrefix::block_txs(height), raw);
    }
}

impl<T: RawWriter + ?Sized> UtxoWriter for T {}

// =============================================================================
// CLAIM-TRIE STORE
// =============================================================================

/// Read side of the claim, support and trie tables.
pub trait ClaimTrieReader: RawReader {
    fn get_claim(&self, claim_hash: &ClaimHash) -> Result<Option<ClaimRecord>, StorageError> {
        self.get_raw(&KeyPrefix::claim(claim_hash))?
            .map(|raw| decode("claim", &raw))
            .transpose()
    }

    /// Hashes of every live claim for a normalized name.
    fn claim_hashes_by_name(&self, name: &str) -> Result<Vec<ClaimHash>, StorageError> {
        let prefix = KeyPrefix::claim_by_name_prefix(name);
        let skip = prefix.len() - 1;
        self.scan_raw(&prefix)?
            .into_iter()
            .map(|(key, _)| KeyCursor::new(KeyPrefix::ClaimByName, &key, skip).claim_hash())
            .collect()
    }

    /// Every live claim for a normalized name, ordered by claim hash.
    fn get_claims_by_name(&self, name: &str) -> Result<Vec<ClaimRecord>, StorageError> {
        let mut claims = Vec::new();
        for claim_hash in self.claim_hashes_by_name(name)? {
            if let Some(claim) = self.get_claim(&claim_hash)? {
                claims.push(claim);
            }
        }
        Ok(claims)
    }

    fn claim_hash_at_outpoint(&self, outpoint: &Outpoint) -> Result<Option<ClaimHash>, StorageError> {
        self.get_raw(&KeyPrefix::claim_by_outpoint(outpoint))?
            .map(|raw| {
                <[u8; 20]>::try_from(raw.as_slice())
                    .map(ClaimHash)
                    .map_err(|_| corrupt("claim outpoint"))
            })
            .transpose()
    }

    fn get_support(&self, outpoint: &Outpoint) -> Result<Option<SupportRecord>, StorageError> {
        self.get_raw(&KeyPrefix::support(outpoint))?
            .map(|raw| decode("support", &raw))
            .transpose()
    }

    /// Live supports of a claim, ordered by outpoint.
    fn get_supports(&self, claim_hash: &ClaimHash) -> Result<Vec<SupportRecord>, StorageError> {
        let mut supports = Vec::new();
        for (key, _) in self.scan_raw(&KeyPrefix::claim_support_prefix(claim_hash))? {
            let outpoint = KeyCursor::new(KeyPrefix::ClaimSupport, &key, 20).outpoint()?;
            if let Some(support) = self.get_support(&outpoint)? {
                supports.push(support);
            }
        }
        Ok(supports)
    }

    /// Supports confirmed at exactly `height`.
    fn supports_at_height(&self, height: Height) -> Result<Vec<SupportRecord>, StorageError> {
        let mut supports = Vec::new();
        for (key, _) in self.scan_raw(&KeyPrefix::support_by_height_prefix(height))? {
            let outpoint = KeyCursor::new(KeyPrefix::SupportByHeight, &key, 4).outpoint()?;
            if let Some(support) = self.get_support(&outpoint)? {
                supports.push(support);
            }
        }
        Ok(supports)
    }

    fn get_trie_entry(&self, name: &str) -> Result<Option<ClaimTrieEntry>, StorageError> {
        self.get_raw(&KeyPrefix::trie(name))?
            .map(|raw| decode("trie entry", &raw))
            .transpose()
    }

    /// Every trie entry, ordered by name bytes.
    fn trie_entries(&self) -> Result<Vec<ClaimTrieEntry>, StorageError> {
        self.scan_raw(&[KeyPrefix::Trie.byte()])?
            .into_iter()
            .map(|(_, raw)| decode("trie entry", &raw))
            .collect()
    }

    fn claims_expiring_at(&self, height: Height) -> Result<Vec<ClaimHash>, StorageError> {
        self.scan_raw(&KeyPrefix::expiration_prefix(height))?
            .into_iter()
            .map(|(key, _)| KeyCursor::new(KeyPrefix::Expiration, &key, 4).claim_hash())
            .collect()
    }

    fn claims_activating_at(&self, height: Height) -> Result<Vec<ClaimHash>, StorageError> {
        self.scan_raw(&KeyPrefix::activation_prefix(height))?
            .into_iter()
            .map(|(key, _)| KeyCursor::new(KeyPrefix::Activation, &key, 4).claim_hash())
            .collect()
    }

    fn claims_in_channel(&self, channel: &ClaimHash) -> Result<Vec<ClaimHash>, StorageError> {
        self.scan_raw(&KeyPrefix::channel_prefix(channel))?
            .into_iter()
            .map(|(key, _)| KeyCursor::new(KeyPrefix::Channel, &key, 20).claim_hash())
            .collect()
    }

    /// Every live claim, ordered by claim hash.
    fn all_claims(&self) -> Result<Vec<ClaimRecord>, StorageError> {
        self.scan_raw(&[KeyPrefix::Claim.byte()])?
            .into_iter()
            .map(|(_, raw)| decode("claim", &raw))
            .collect()
    }

    /// Block hash recorded for the committed tip.
    fn tip_hash(&self) -> Result<Option<BlockHash>, StorageError> {
        Ok(self.chain_state()?.map(|state| state.tip))
    }
}

impl<T: RawReader + ?Sized> ClaimTrieReader for T {}

/// Write side of the claim, support and trie tables. Secondary indexes are
/// kept in step with the primary rows.
pub trait ClaimTrieWriter: RawWriter + ClaimTrieReader {
    fn put_claim(&mut self, claim: &ClaimRecord) -> Result<(), StorageError> {
        if let Some(old) = self.get_claim(&claim.claim_hash)? {
            self.delete_claim_indexes(&old);
        }
        let raw = encode("claim", claim)?;
        self.put_raw(KeyPrefix::claim(&claim.claim_hash), raw);
        self.put_raw(KeyPrefix::claim_by_name(&claim.name, &claim.claim_hash), Vec::new());
        self.put_raw(
            KeyPrefix::claim_by_outpoint(&claim.outpoint),
            claim.claim_hash.0.to_vec(),
        );
        self.put_raw(
            KeyPrefix::expiration(claim.expiration_height, &claim.claim_hash),
            Vec::new(),
        );
        if let Some(activation) = claim.activation_height {
            self.put_raw(KeyPrefix::activation(activation, &claim.claim_hash), Vec::new());
        }
        if let Some(channel) = claim.channel_hash {
            self.put_raw(KeyPrefix::channel(&channel, &claim.claim_hash), Vec::new());
        }
        Ok(())
    }

    fn delete_claim(&mut self, claim_hash: &ClaimHash) -> Result<Option<ClaimRecord>, StorageError> {
        let Some(claim) = self.get_claim(claim_hash)? else {
            return Ok(None);
        };
        self.delete_claim_indexes(&claim);
        self.delete_raw(KeyPrefix::claim(claim_hash));
        Ok(Some(claim))
    }

    #[doc(hidden)]
    fn delete_claim_indexes(&mut self, claim: &ClaimRecord) {
        self.delete_raw(KeyPrefix::claim_by_name(&claim.name, &claim.claim_hash));
        self.delete_raw(KeyPrefix::claim_by_outpoint(&claim.outpoint));
        self.delete_raw(KeyPrefix::expiration(claim.expiration_height, &claim.claim_hash));
        if let Some(activation) = claim.activation_height {
            self.delete_raw(KeyPrefix::activation(activation, &claim.claim_hash));
        }
        if let Some(channel) = claim.channel_hash {
            self.delete_raw(KeyPrefix::channel(&channel, &claim.claim_hash));
        }
    }

    fn put_support(&mut self, support: &SupportRecord) -> Result<(), StorageError> {
        let raw = encode("support", support)?;
        self.put_raw(KeyPrefix::support(&support.outpoint), raw);
        self.put_raw(
            KeyPrefix::claim_support(&support.claim_hash, &support.outpoint),
            Vec::new(),
        );
        self.put_raw(
            KeyPrefix::support_by_height(support.height, &support.outpoint),
            support.claim_hash.0.to_vec(),
        );
        Ok(())
    }

    fn delete_support(&mut self, outpoint: &Outpoint) -> Result<Option<SupportRecord>, StorageError> {
        let Some(support) = self.get_support(outpoint)? else {
            return Ok(None);
        };
        self.delete_raw(KeyPrefix::support(outpoint));
        self.delete_raw(KeyPrefix::claim_support(&support.claim_hash, outpoint));
        self.delete_raw(KeyPrefix::support_by_height(support.height, outpoint));
        Ok(Some(support))
    }

    fn put_trie_entry(&mut self, entry: &ClaimTrieEntry) -> Result<(), StorageError> {
        let raw = encode("trie entry", entry)?;
        self.put_raw(KeyPrefix::trie(&entry.name), raw);
        Ok(())
    }

    fn delete_trie_entry(&mut self, name: &str) {
        self.delete_raw(KeyPrefix::trie(name));
    }
}

impl<T: RawWriter + ?Sized> ClaimTrieWriter for T {}
