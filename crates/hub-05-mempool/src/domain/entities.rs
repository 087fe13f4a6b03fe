//! Mempool entities.

use hub_01_codec::{output_hashx, CodecError, Transaction};
use shared_types::{HashX, Outpoint, TxHash};

/// An output's owner and value. Outputs without a hashX (data carriers,
/// unparseable claim scripts) keep their position with `None`.
pub type ValuePair = (Option<HashX>, u64);

/// A decoded transaction whose inputs are not yet resolved.
#[derive(Debug, Clone)]
pub struct PendingTx {
    pub raw: Vec<u8>,
    /// Spent outpoints, coinbase-like inputs excluded.
    pub prevouts: Vec<Outpoint>,
    pub out_pairs: Vec<ValuePair>,
    /// Virtual size in bytes.
    pub size: u64,
}

impl PendingTx {
    pub fn decode(raw: Vec<u8>) -> Result<(TxHash, Self), CodecError> {
        let tx = Transaction::decode(&raw)?;
        let prevouts = tx
            .inputs
            .iter()
            .filter(|input| !input.is_coinbase())
            .map(|input| input.prev_out)
            .collect();
        let out_pairs = tx
            .outputs
            .iter()
            .map(|output| (output_hashx(&output.script), output.value))
            .collect();
        let base = tx.encode_without_witness().len() as u64;
        let weight = base * 3 + raw.len() as u64;
        Ok((
            tx.txid(),
            Self {
                raw,
                prevouts,
                out_pairs,
                size: weight.div_ceil(4),
            },
        ))
    }
}

/// An accepted unconfirmed transaction.
#[derive(Debug, Clone)]
pub struct MempoolTx {
    pub raw: Vec<u8>,
    pub prevouts: Vec<Outpoint>,
    /// Resolved owner and value of each prevout.
    pub in_pairs: Vec<ValuePair>,
    pub out_pairs: Vec<ValuePair>,
    pub fee: u64,
    pub size: u64,
}

impl MempoolTx {
    /// Every hashX the transaction spends from or pays to.
    pub fn hashxs(&self) -> impl Iterator<Item = HashX> + '_ {
        self.in_pairs
            .iter()
            .chain(&self.out_pairs)
            .filter_map(|(hashx, _)| *hashx)
    }
}

/// Per-address view of a mempool transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSummary {
    pub tx_hash: TxHash,
    pub fee: u64,
    pub has_unconfirmed_inputs: bool,
}

impl TxSummary {
    /// Height reported to clients: -1 with unconfirmed inputs, else 0.
    pub fn height(&self) -> i64 {
        if self.has_unconfirmed_inputs {
            -1
        } else {
            0
        }
    }
}

/// An unconfirmed output paying an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MempoolUtxo {
    pub tx_hash: TxHash,
    pub nout: u32,
    pub value: u64,
}

/// Mempool standing of a transaction, as reported by
/// `blockchain.transaction.get_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MempoolStatus {
    Unknown,
    UnconfirmedParent,
    Pending,
}

impl MempoolStatus {
    pub fn height(self) -> i64 {
        match self {
            Self::Unknown => -2,
            Self::UnconfirmedParent => -1,
            Self::Pending => 0,
        }
    }
}
