//! # Key Schema
//!
//! Every row lives in one ordered key space. The first byte selects the
//! table; heights and positions are big-endian so prefix scans come back in
//! chain order.
//!
//! | Prefix | Key | Value |
//! |--------|-----|-------|
//! | `u` | outpoint | [`UtxoEntry`](super::entities::UtxoEntry) |
//! | `h` | hashX, outpoint | value (u64 LE) |
//! | `H` | hashX, height, position | tx hash |
//! | `T` | tx hash | [`TxLocation`](super::entities::TxLocation) |
//! | `R` | tx hash | raw transaction |
//! | `B` | height | concatenated tx hashes of the block |
//! | `c` | claim hash | [`ClaimRecord`](super::entities::ClaimRecord) |
//! | `n` | name length, name, claim hash | empty |
//! | `o` | outpoint | claim hash |
//! | `s` | outpoint | [`SupportRecord`](super::entities::SupportRecord) |
//! | `S` | claim hash, outpoint | empty |
//! | `y` | height, outpoint | claim hash |
//! | `t` | name | [`ClaimTrieEntry`](super::entities::ClaimTrieEntry) |
//! | `e` | expiration height, claim hash | empty |
//! | `a` | activation height, claim hash | empty |
//! | `C` | channel hash, claim hash | empty |
//! | `U` | height | [`UndoRecord`](super::entities::UndoRecord) |
//! | `M` | | [`ChainState`](super::entities::ChainState) |

use shared_types::{ClaimHash, HashX, Height, Outpoint, TxHash, HASHX_LEN};

use crate::domain::errors::StorageError;

/// Table selector, the first byte of every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    Utxo,
    HashXUtxo,
    History,
    TxLocation,
    RawTx,
    BlockTxs,
    Claim,
    ClaimByName,
    ClaimByOutpoint,
    Support,
    ClaimSupport,
    SupportByHeight,
    Trie,
    Expiration,
    Activation,
    Channel,
    Undo,
    ChainState,
}

impl KeyPrefix {
    pub fn byte(&self) -> u8 {
        match self {
            KeyPrefix::Utxo => b'u',
            KeyPrefix::HashXUtxo => b'h',
            KeyPrefix::History => b'H',
            KeyPrefix::TxLocation => b'T',
            KeyPrefix::RawTx => b'R',
            KeyPrefix::BlockTxs => b'B',
            KeyPrefix::Claim => b'c',
            KeyPrefix::ClaimByName => b'n',
            KeyPrefix::ClaimByOutpoint => b'o',
            KeyPrefix::Support => b's',
            KeyPrefix::ClaimSupport => b'S',
            KeyPrefix::SupportByHeight => b'y',
            KeyPrefix::Trie => b't',
            KeyPrefix::Expiration => b'e',
            KeyPrefix::Activation => b'a',
            KeyPrefix::Channel => b'C',
            KeyPrefix::Undo => b'U',
            KeyPrefix::ChainState => b'M',
        }
    }

    pub fn as_char(&self) -> char {
        char::from(self.byte())
    }

    /// Build a full key from the prefix and the given parts.
    pub fn key(&self, parts: &[&[u8]]) -> Vec<u8> {
        let len = 1 + parts.iter().map(|p| p.len()).sum::<usize>();
        let mut key = Vec::with_capacity(len);
        key.push(self.byte());
        for part in parts {
            key.extend_from_slice(part);
        }
        key
    }

    pub fn utxo(outpoint: &Outpoint) -> Vec<u8> {
        KeyPrefix::Utxo.key(&[&outpoint.to_bytes()])
    }

    pub fn hashx_utxo(hashx: &HashX, outpoint: &Outpoint) -> Vec<u8> {
        KeyPrefix::HashXUtxo.key(&[hashx.as_bytes(), &outpoint.to_bytes()])
    }

    pub fn hashx_utxo_prefix(hashx: &HashX) -> Vec<u8> {
        KeyPrefix::HashXUtxo.key(&[hashx.as_bytes()])
    }

    pub fn history(hashx: &HashX, height: Height, position: u32) -> Vec<u8> {
        KeyPrefix::History.key(&[
            hashx.as_bytes(),
            &height.to_be_bytes(),
            &position.to_be_bytes(),
        ])
    }

    pub fn history_prefix(hashx: &HashX) -> Vec<u8> {
        KeyPrefix::History.key(&[hashx.as_bytes()])
    }

    pub fn tx_location(tx_hash: &TxHash) -> Vec<u8> {
        KeyPrefix::TxLocation.key(&[tx_hash])
    }

    pub fn raw_tx(tx_hash: &TxHash) -> Vec<u8> {
        KeyPrefix::RawTx.key(&[tx_hash])
    }

    pub fn block_txs(height: Height) -> Vec<u8> {
        KeyPrefix::BlockTxs.key(&[&height.to_be_bytes()])
    }

    pub fn claim(claim_hash: &ClaimHash) -> Vec<u8> {
        KeyPrefix::Claim.key(&[&claim_hash.0])
    }

    /// Names are length-prefixed so one name is never a prefix match for
    /// another.
    pub fn claim_by_name_prefix(name: &str) -> Vec<u8> {
        let len = u16::try_from(name.len()).unwrap_or(u16::MAX);
        KeyPrefix::ClaimByName.key(&[&len.to_be_bytes(), name.as_bytes()])
    }

    pub fn claim_by_name(name: &str, claim_hash: &ClaimHash) -> Vec<u8> {
        let mut key = Self::claim_by_name_prefix(name);
        key.extend_from_slice(&claim_hash.0);
        key
    }

    pub fn claim_by_outpoint(outpoint: &Outpoint) -> Vec<u8> {
        KeyPrefix::ClaimByOutpoint.key(&[&outpoint.to_bytes()])
    }

    pub fn support(outpoint: &Outpoint) -> Vec<u8> {
        KeyPrefix::Support.key(&[&outpoint.to_bytes()])
    }

    pub fn claim_support(claim_hash: &ClaimHash, outpoint: &Outpoint) -> Vec<u8> {
        KeyPrefix::ClaimSupport.key(&[&claim_hash.0, &outpoint.to_bytes()])
    }

    pub fn claim_support_prefix(claim_hash: &ClaimHash) -> Vec<u8> {
        KeyPrefix::ClaimSupport.key(&[&claim_hash.0])
    }

    pub fn support_by_height(height: Height, outpoint: &Outpoint) -> Vec<u8> {
        KeyPrefix::SupportByHeight.key(&[&height.to_be_bytes(), &outpoint.to_bytes()])
    }

    pub fn support_by_height_prefix(height: Height) -> Vec<u8> {
        KeyPrefix::SupportByHeight.key(&[&height.to_be_bytes()])
    }

    pub fn trie(name: &str) -> Vec<u8> {
        KeyPrefix::Trie.key(&[name.as_bytes()])
    }

    pub fn expiration(height: Height, claim_hash: &ClaimHash) -> Vec<u8> {
        KeyPrefix::Expiration.key(&[&height.to_be_bytes(), &claim_hash.0])
    }

    pub fn expiration_prefix(height: Height) -> Vec<u8> {
        KeyPrefix::Expiration.key(&[&height.to_be_bytes()])
    }

    pub fn activation(height: Height, claim_hash: &ClaimHash) -> Vec<u8> {
        KeyPrefix::Activation.key(&[&height.to_be_bytes(), &claim_hash.0])
    }

    pub fn activation_prefix(height: Height) -> Vec<u8> {
        KeyPrefix::Activation.key(&[&height.to_be_bytes()])
    }

    pub fn channel(channel: &ClaimHash, claim_hash: &ClaimHash) -> Vec<u8> {
        KeyPrefix::Channel.key(&[&channel.0, &claim_hash.0])
    }

    pub fn channel_prefix(channel: &ClaimHash) -> Vec<u8> {
        KeyPrefix::Channel.key(&[&channel.0])
    }

    pub fn undo(height: Height) -> Vec<u8> {
        KeyPrefix::Undo.key(&[&height.to_be_bytes()])
    }

    pub fn chain_state() -> Vec<u8> {
        vec![KeyPrefix::ChainState.byte()]
    }
}

/// Reads fixed-width fields back out of a key, after the prefix byte.
pub(crate) struct KeyCursor<'a> {
    prefix: KeyPrefix,
    key: &'a [u8],
    offset: usize,
}

impl<'a> KeyCursor<'a> {
    pub fn new(prefix: KeyPrefix, key: &'a [u8], skip: usize) -> Self {
        Self {
            prefix,
            key,
            offset: 1 + skip,
        }
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let bytes = self.key.get(self.offset..self.offset + len)?;
        self.offset += len;
        Some(bytes)
    }

    fn malformed(&self) -> StorageError {
        StorageError::MalformedKey {
            prefix: self.prefix.as_char(),
            len: self.key.len(),
        }
    }

    pub fn height(&mut self) -> Result<Height, StorageError> {
        let bytes = self.take(4).ok_or_else(|| self.malformed())?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        Ok(Height::from_be_bytes(raw))
    }

    pub fn position(&mut self) -> Result<u32, StorageError> {
        self.height()
    }

    pub fn outpoint(&mut self) -> Result<Outpoint, StorageError> {
        self.take(Outpoint::LEN)
            .and_then(Outpoint::from_bytes)
            .ok_or_else(|| self.malformed())
    }

    pub fn claim_hash(&mut self) -> Result<ClaimHash, StorageError> {
        let bytes = self.take(20).ok_or_else(|| self.malformed())?;
        let mut raw = [0u8; 20];
        raw.copy_from_slice(bytes);
        Ok(ClaimHash(raw))
    }

    pub fn skip_hashx(&mut self) -> Result<(), StorageError> {
        self.take(HASHX_LEN).map(|_| ()).ok_or_else(|| self.malformed())
    }
}
