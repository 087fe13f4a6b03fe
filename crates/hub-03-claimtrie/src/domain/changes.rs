//! Per-block inputs to the engine and what it reports back.

use std::collections::BTreeSet;

use hub_01_codec::ClaimOperation;
use shared_types::{ClaimHash, Height, Outpoint, TxHash};

/// A claim-affecting output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimOutput {
    pub nout: u32,
    pub amount: u64,
    pub operation: ClaimOperation,
}

/// The claim-relevant view of one confirmed transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimTx {
    pub tx_hash: TxHash,
    pub position: u32,
    /// Every outpoint the transaction spends.
    pub spent: Vec<Outpoint>,
    pub outputs: Vec<ClaimOutput>,
}

/// A change of controlling claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Takeover {
    pub name: String,
    pub from: Option<ClaimHash>,
    pub to: Option<ClaimHash>,
    pub height: Height,
}

/// What one block did to the claim tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimBlockSummary {
    pub height: Height,
    /// Claims created, updated, supported, re-ranked or removed.
    pub touched_claims: BTreeSet<ClaimHash>,
    pub touched_names: BTreeSet<String>,
    pub abandoned: Vec<ClaimHash>,
    pub expired: Vec<ClaimHash>,
    pub takeovers: Vec<Takeover>,
}
