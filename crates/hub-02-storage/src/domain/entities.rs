//! # Stored Rows
//!
//! Values written under the [`KeyPrefix`](super::keys::KeyPrefix) tables.
//! Fixed-width rows use hand-packed bytes; structured rows use `bincode`.

use hub_01_codec::ClaimKind;
use serde::{Deserialize, Serialize};
use shared_types::{BlockHash, ClaimHash, HashX, Height, Outpoint, TxHash, HASHX_LEN};

use super::keys::KeyPrefix;

/// An unspent output: owning script fingerprint and value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtxoEntry {
    pub hashx: HashX,
    pub value: u64,
}

impl UtxoEntry {
    pub const LEN: usize = HASHX_LEN + 8;

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[..HASHX_LEN].copy_from_slice(self.hashx.as_bytes());
        out[HASHX_LEN..].copy_from_slice(&self.value.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::LEN {
            return None;
        }
        let hashx = HashX::from_slice(&bytes[..HASHX_LEN])?;
        let mut value = [0u8; 8];
        value.copy_from_slice(&bytes[HASHX_LEN..]);
        Some(Self {
            hashx,
            value: u64::from_le_bytes(value),
        })
    }
}

/// Where a confirmed transaction sits in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxLocation {
    pub height: Height,
    pub position: u32,
}

impl TxLocation {
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.height.to_le_bytes());
        out[4..].copy_from_slice(&self.position.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 8 {
            return None;
        }
        let mut height = [0u8; 4];
        let mut position = [0u8; 4];
        height.copy_from_slice(&bytes[..4]);
        position.copy_from_slice(&bytes[4..]);
        Some(Self {
            height: Height::from_le_bytes(height),
            position: u32::from_le_bytes(position),
        })
    }
}

/// A confirmed history row for one hashX.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryItem {
    pub tx_hash: TxHash,
    pub height: Height,
    pub position: u32,
}

/// A live claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub claim_hash: ClaimHash,
    /// Normalized name, the trie key.
    pub name: String,
    /// Name as it appeared in the claim script.
    pub original_name: String,
    /// Output currently holding the claim.
    pub outpoint: Outpoint,
    /// Position of the holding transaction in its block.
    pub tx_position: u32,
    pub amount: u64,
    /// `amount` plus every live support, once activated.
    pub effective_amount: u64,
    pub support_amount: u64,
    pub trending_amount: u64,
    /// Height the claim was first created.
    pub height: Height,
    /// Height of the most recent update, equal to `height` until updated.
    pub update_height: Height,
    pub activation_height: Option<Height>,
    pub expiration_height: Height,
    pub channel_hash: Option<ClaimHash>,
    pub kind: ClaimKind,
    /// Raw claim value envelope.
    pub value: Vec<u8>,
}

impl ClaimRecord {
    pub fn is_active_at(&self, height: Height) -> bool {
        self.activation_height.is_some_and(|h| h <= height)
    }

    pub fn claim_id(&self) -> String {
        self.claim_hash.claim_id()
    }
}

/// A live support, keyed by its own outpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportRecord {
    pub outpoint: Outpoint,
    pub claim_hash: ClaimHash,
    pub amount: u64,
    pub height: Height,
}

/// The controlling claim of one name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimTrieEntry {
    pub name: String,
    pub claim_hash: ClaimHash,
    pub last_take_over_height: Height,
}

/// The committed tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    pub height: Height,
    pub tip: BlockHash,
    pub tx_count: u64,
    pub utxo_count: u64,
}

/// Prior value of every key a block changed; `None` means the key did not
/// exist before the block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoRecord {
    pub entries: Vec<(Vec<u8>, Option<Vec<u8>>)>,
}

impl UndoRecord {
    /// Restored keys belonging to one table, prefix byte included.
    pub fn keys_in(&self, table: KeyPrefix) -> impl Iterator<Item = &[u8]> + '_ {
        let byte = table.byte();
        self.entries
            .iter()
            .map(|(key, _)| key.as_slice())
            .filter(move |key| key.first() == Some(&byte))
    }
}
