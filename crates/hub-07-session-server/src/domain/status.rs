//! Address status and history rows.
//!
//! The status of an address is the SHA-256 of `txid:height:` for every
//! confirmed transaction in chain order, followed by every unconfirmed one
//! (height 0, or -1 with unconfirmed inputs). An address with no history
//! has no status.

use hub_02_storage::HistoryItem;
use hub_05_mempool::TxSummary;
use serde_json::{json, Value};
use shared_types::{hash_to_hex_str, sha256};

pub fn address_status(history: &[HistoryItem], mempool: &[TxSummary]) -> Option<String> {
    if history.is_empty() && mempool.is_empty() {
        return None;
    }
    let mut preimage = String::new();
    for item in history {
        preimage.push_str(&format!("{}:{}:", hash_to_hex_str(&item.tx_hash), item.height));
    }
    for tx in mempool {
        preimage.push_str(&format!("{}:{}:", hash_to_hex_str(&tx.tx_hash), tx.height()));
    }
    Some(hex::encode(sha256(preimage.as_bytes())))
}

pub fn confirmed_rows(history: &[HistoryItem]) -> Vec<Value> {
    history
        .iter()
        .map(|item| json!({"tx_hash": hash_to_hex_str(&item.tx_hash), "height": item.height}))
        .collect()
}

pub fn unconfirmed_rows(mempool: &[TxSummary]) -> Vec<Value> {
    mempool
        .iter()
        .map(|tx| {
            json!({
                "tx_hash": hash_to_hex_str(&tx.tx_hash),
                "height": tx.height(),
                "fee": tx.fee,
            })
        })
        .collect()
}
