//! Result rows and their wire encoding: `bincode`, then base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hub_01_codec::ClaimKind;
use serde::{Deserialize, Serialize};
use shared_types::{ClaimHash, Height, Outpoint};

use super::errors::QueryError;

/// One claim as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimMeta {
    pub claim_hash: ClaimHash,
    pub name: String,
    pub normalized_name: String,
    pub outpoint: Outpoint,
    pub tx_position: u32,
    /// Height of the latest update.
    pub height: Height,
    pub creation_height: Height,
    pub activation_height: Option<Height>,
    pub expiration_height: Height,
    pub amount: u64,
    pub effective_amount: u64,
    pub support_amount: u64,
    pub trending_amount: u64,
    pub is_controlling: bool,
    /// Takeover height of the name, when the name has a controlling claim.
    pub last_take_over_height: Option<Height>,
    pub channel_hash: Option<ClaimHash>,
    /// Live claims signed by this claim, for channels.
    pub claims_in_channel: Option<u64>,
    pub kind: ClaimKind,
    /// `lbry://name#shortest-unique-id-prefix`.
    pub short_url: String,
    pub value: Vec<u8>,
}

/// Why a URL did not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolveErrorKind {
    InvalidUrl,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputRow {
    Claim(ClaimMeta),
    Error {
        kind: ResolveErrorKind,
        message: String,
    },
}

impl OutputRow {
    pub fn claim(&self) -> Option<&ClaimMeta> {
        match self {
            Self::Claim(meta) => Some(meta),
            Self::Error { .. } => None,
        }
    }
}

/// A resolve or search response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outputs {
    /// One row per URL for resolve; one per hit for search.
    pub txos: Vec<OutputRow>,
    /// Channels referenced by `txos`, each listed once.
    pub extra_txos: Vec<ClaimMeta>,
    pub offset: u32,
    /// Matches before paging, unless the search skipped counting.
    pub total: Option<u64>,
}

impl Outputs {
    pub fn to_base64(&self) -> Result<String, QueryError> {
        let bytes = bincode::serialize(self).map_err(|e| QueryError::Internal(e.to_string()))?;
        Ok(STANDARD.encode(bytes))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, QueryError> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| QueryError::Internal(e.to_string()))?;
        bincode::deserialize(&bytes).map_err(|e| QueryError::Internal(e.to_string()))
    }

    pub fn claims(&self) -> impl Iterator<Item = &ClaimMeta> {
        self.txos.iter().filter_map(OutputRow::claim)
    }
}
