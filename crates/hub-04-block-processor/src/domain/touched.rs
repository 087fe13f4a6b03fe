//! What a committed or rewound block changed.

use std::collections::BTreeSet;

use hub_03_claimtrie::Takeover;
use shared_types::{BlockHash, ClaimHash, HashX, Height};

/// Value flows of one block.
///
/// `value_created + value_burned - value_spent == coinbase_value - fees`
/// for every block after genesis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    pub tx_count: usize,
    /// Sum of new unspent outputs.
    pub value_created: u64,
    /// Sum of outputs with no owner (`OP_RETURN`, empty scripts).
    pub value_burned: u64,
    /// Sum of outputs consumed by the block's inputs.
    pub value_spent: u64,
    pub fees: u64,
    pub coinbase_value: u64,
}

impl BlockStats {
    /// New coins minted by the block.
    pub fn subsidy(&self) -> u64 {
        self.coinbase_value.saturating_sub(self.fees)
    }
}

/// Result of [`BlockProcessor::advance_block`](crate::BlockProcessor::advance_block).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchedSet {
    pub height: Height,
    pub block_hash: BlockHash,
    /// Script hashes that gained a confirmed history row.
    pub hashxs: BTreeSet<HashX>,
    /// Claims created, updated, re-ranked or removed.
    pub claims: BTreeSet<ClaimHash>,
    pub takeovers: Vec<Takeover>,
    pub stats: BlockStats,
}

/// Result of [`BlockProcessor::rewind`](crate::BlockProcessor::rewind).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewindSummary {
    pub from_height: Height,
    pub to_height: Height,
    pub hashxs: BTreeSet<HashX>,
    pub claims: BTreeSet<ClaimHash>,
}

impl RewindSummary {
    pub fn blocks_removed(&self) -> u32 {
        self.from_height - self.to_height
    }
}
