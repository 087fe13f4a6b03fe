//! Claim store fixtures shared by the crate's tests.

use hub_01_codec::ClaimKind;
use hub_02_storage::{ChainState, ClaimRecord, ClaimTrieEntry, ClaimTrieWriter, HubDb, UtxoWriter};
use shared_types::{ClaimHash, Height, Outpoint};

/// An active stream claim created at height 1.
pub fn claim(seed: u8, name: &str, effective_amount: u64) -> ClaimRecord {
    ClaimRecord {
        claim_hash: ClaimHash([seed; 20]),
        name: shared_types::normalize_name(name),
        original_name: name.into(),
        outpoint: Outpoint::new([seed; 32], 0),
        tx_position: 1,
        amount: effective_amount,
        effective_amount,
        support_amount: 0,
        trending_amount: 0,
        height: 1,
        update_height: 1,
        activation_height: Some(1),
        expiration_height: 1_000,
        channel_hash: None,
        kind: ClaimKind::Stream,
        value: Vec::new(),
    }
}

pub fn channel(seed: u8, name: &str, effective_amount: u64) -> ClaimRecord {
    ClaimRecord {
        kind: ClaimKind::Channel,
        ..claim(seed, name, effective_amount)
    }
}

pub fn signed(mut record: ClaimRecord, channel: &ClaimRecord) -> ClaimRecord {
    record.channel_hash = Some(channel.claim_hash);
    record
}

pub fn controlling(record: &ClaimRecord, height: Height) -> ClaimTrieEntry {
    ClaimTrieEntry {
        name: record.name.clone(),
        claim_hash: record.claim_hash,
        last_take_over_height: height,
    }
}

/// Commit one block at `height` holding `claims`.
pub fn write_claims(db: &HubDb, height: Height, claims: &[ClaimRecord]) {
    write_block(db, height, claims, &[]);
}

pub fn write_block(db: &HubDb, height: Height, claims: &[ClaimRecord], trie: &[ClaimTrieEntry]) {
    let mut txn = db.begin_block(height).unwrap();
    for record in claims {
        txn.put_claim(record).unwrap();
    }
    for entry in trie {
        txn.put_trie_entry(entry).unwrap();
    }
    txn.put_chain_state(&ChainState {
        height,
        tip: [height as u8; 32],
        tx_count: 0,
        utxo_count: 0,
    })
    .unwrap();
    txn.commit().unwrap();
}
