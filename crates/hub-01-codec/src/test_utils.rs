//! # Test Utilities
//!
//! Builders for transactions, blocks and claim scripts shared by the tests of
//! every hub crate. Enabled for other crates through the `test-utils` feature.

use shared_types::{ClaimHash, Outpoint, TxHash, ZERO_HASH};

use crate::domain::block::Block;
use crate::domain::claim::{ClaimKind, ClaimValue};
use crate::domain::header::BlockHeader;
use crate::domain::merkle::merkle_root;
use crate::domain::script::builder;
use crate::domain::transaction::{Transaction, TxInput, TxOutput};

pub fn p2pkh_script(pubkey_hash: [u8; 20]) -> Vec<u8> {
    builder::pay_pubkey_hash(&pubkey_hash)
}

/// Unsigned stream claim value.
pub fn stream_value(title: &str) -> Vec<u8> {
    ClaimValue::unsigned(ClaimKind::Stream, title.as_bytes()).encode()
}

/// Unsigned channel claim value.
pub fn channel_value(title: &str) -> Vec<u8> {
    ClaimValue::unsigned(ClaimKind::Channel, title.as_bytes()).encode()
}

/// Stream claim value signed by `channel`.
pub fn signed_stream_value(title: &str, channel: ClaimHash) -> Vec<u8> {
    ClaimValue::signed(ClaimKind::Stream, title.as_bytes(), channel).encode()
}

pub fn claim_script(name: &str, value: &[u8], owner: [u8; 20]) -> Vec<u8> {
    builder::claim_name(name.as_bytes(), value, &p2pkh_script(owner))
}

/// Claim whose payment is a bare public key rather than its hash.
pub fn claim_script_to_pubkey(name: &str, value: &[u8], pubkey: &[u8]) -> Vec<u8> {
    builder::claim_name(name.as_bytes(), value, &builder::pay_pubkey_full(pubkey))
}

pub fn support_script(name: &str, claim_hash: &ClaimHash, owner: [u8; 20]) -> Vec<u8> {
    builder::support_claim(name.as_bytes(), claim_hash, &p2pkh_script(owner))
}

pub fn update_script(name: &str, claim_hash: &ClaimHash, value: &[u8], owner: [u8; 20]) -> Vec<u8> {
    builder::update_claim(name.as_bytes(), claim_hash, value, &p2pkh_script(owner))
}

/// Coinbase paying `value` to `script`. The height goes into the input
/// script so coinbases at different heights have different txids.
pub fn coinbase_tx(height: u32, value: u64, script: Vec<u8>) -> Transaction {
    let mut input_script = Vec::new();
    builder::push_integer(&mut input_script, i64::from(height));
    Transaction {
        version: 1,
        inputs: vec![TxInput::new(Outpoint::new(ZERO_HASH, u32::MAX), input_script)],
        outputs: vec![TxOutput { value, script }],
        locktime: 0,
    }
}

/// Fluent transaction builder.
#[derive(Debug, Default)]
pub struct TxBuilder {
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    locktime: u32,
}

impl TxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spend(mut self, outpoint: Outpoint) -> Self {
        self.inputs.push(TxInput::new(outpoint, vec![0x51]));
        self
    }

    pub fn pay(mut self, value: u64, script: Vec<u8>) -> Self {
        self.outputs.push(TxOutput { value, script });
        self
    }

    /// Distinguishes otherwise identical transactions.
    pub fn locktime(mut self, locktime: u32) -> Self {
        self.locktime = locktime;
        self
    }

    pub fn build(self) -> Transaction {
        Transaction {
            version: 1,
            inputs: self.inputs,
            outputs: self.outputs,
            locktime: self.locktime,
        }
    }
}

/// Builds a block with a correct merkle root on top of `prev_block_hash`.
#[derive(Debug)]
pub struct BlockBuilder {
    prev_block_hash: TxHash,
    timestamp: u32,
    nonce: u32,
    transactions: Vec<Transaction>,
}

impl BlockBuilder {
    pub fn new(prev_block_hash: TxHash) -> Self {
        Self {
            prev_block_hash,
            timestamp: 1_600_000_000,
            nonce: 0,
            transactions: Vec::new(),
        }
    }

    pub fn with_transaction(mut self, tx: Transaction) -> Self {
        self.transactions.push(tx);
        self
    }

    pub fn with_transactions(mut self, txs: impl IntoIterator<Item = Transaction>) -> Self {
        self.transactions.extend(txs);
        self
    }

    /// Distinguishes competing blocks at the same height.
    pub fn nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn build(self) -> Block {
        let hashes: Vec<_> = self.transactions.iter().map(Transaction::txid).collect();
        Block {
            header: BlockHeader {
                version: 1,
                prev_block_hash: self.prev_block_hash,
                merkle_root: merkle_root(&hashes),
                claim_trie_root: [0u8; 32],
                timestamp: self.timestamp,
                bits: 0x207f_ffff,
                nonce: self.nonce,
            },
            transactions: self.transactions,
        }
    }
}
