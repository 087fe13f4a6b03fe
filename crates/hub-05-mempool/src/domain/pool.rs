//! # Transaction Pool
//!
//! Unconfirmed transactions indexed two ways:
//!
//! - `txs`: tx hash to [`MempoolTx`]
//! - `hashxs`: hashX to the hashes of every transaction touching it
//!
//! A transaction is accepted only once every prevout resolves, either to a
//! confirmed UTXO or to an output of an accepted mempool transaction.
//! Unresolved transactions are handed back to the caller, which retries
//! them until a round makes no progress.

use std::collections::{BTreeSet, HashMap, HashSet};

use shared_types::{HashX, Outpoint, TxHash};

use super::entities::{MempoolStatus, MempoolTx, MempoolUtxo, PendingTx, TxSummary};

/// Confirmed outputs fetched for pending prevouts; `None` when the store
/// has no such unspent output.
pub type UtxoMap = HashMap<Outpoint, Option<(HashX, u64)>>;

#[derive(Debug, Default)]
pub struct TxPool {
    txs: HashMap<TxHash, MempoolTx>,
    hashxs: HashMap<HashX, HashSet<TxHash>>,
}

impl TxPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn address_count(&self) -> usize {
        self.hashxs.len()
    }

    pub fn contains(&self, tx_hash: &TxHash) -> bool {
        self.txs.contains_key(tx_hash)
    }

    pub fn get(&self, tx_hash: &TxHash) -> Option<&MempoolTx> {
        self.txs.get(tx_hash)
    }

    pub fn tx_hashes(&self) -> impl Iterator<Item = &TxHash> {
        self.txs.keys()
    }

    /// Drop every transaction not in `live`, recording the hashXs it touched.
    pub fn remove_vanished(&mut self, live: &HashSet<TxHash>, touched: &mut BTreeSet<HashX>) {
        let gone: Vec<TxHash> = self
            .txs
            .keys()
            .filter(|hash| !live.contains(*hash))
            .copied()
            .collect();
        for tx_hash in gone {
            let Some(tx) = self.txs.remove(&tx_hash) else {
                continue;
            };
            for hashx in tx.hashxs() {
                if let Some(set) = self.hashxs.get_mut(&hashx) {
                    set.remove(&tx_hash);
                    if set.is_empty() {
                        self.hashxs.remove(&hashx);
                    }
                }
                touched.insert(hashx);
            }
        }
    }

    /// Accept every pending transaction whose prevouts resolve.
    ///
    /// Returns the deferred transactions and the confirmed outputs nobody
    /// spent yet, to be fed into the next round.
    pub fn accept(
        &mut self,
        pending: HashMap<TxHash, PendingTx>,
        utxos: UtxoMap,
        touched: &mut BTreeSet<HashX>,
    ) -> (HashMap<TxHash, PendingTx>, UtxoMap) {
        let mut deferred = HashMap::new();
        let mut unspent: HashSet<Outpoint> = utxos.keys().copied().collect();

        for (tx_hash, tx) in pending {
            let Some(in_pairs) = self.resolve_inputs(&tx.prevouts, &utxos) else {
                deferred.insert(tx_hash, tx);
                continue;
            };
            for prevout in &tx.prevouts {
                unspent.remove(prevout);
            }
            let value_in: u64 = in_pairs.iter().map(|(_, value)| value).sum();
            let value_out: u64 = tx.out_pairs.iter().map(|(_, value)| value).sum();
            let accepted = MempoolTx {
                raw: tx.raw,
                prevouts: tx.prevouts,
                in_pairs,
                out_pairs: tx.out_pairs,
                fee: value_in.saturating_sub(value_out),
                size: tx.size,
            };
            for hashx in accepted.hashxs() {
                touched.insert(hashx);
                self.hashxs.entry(hashx).or_default().insert(tx_hash);
            }
            self.txs.insert(tx_hash, accepted);
        }

        let unspent = utxos
            .into_iter()
            .filter(|(prevout, _)| unspent.contains(prevout))
            .collect();
        (deferred, unspent)
    }

    fn resolve_inputs(
        &self,
        prevouts: &[Outpoint],
        utxos: &UtxoMap,
    ) -> Option<Vec<(Option<HashX>, u64)>> {
        prevouts
            .iter()
            .map(|prevout| match utxos.get(prevout) {
                Some(Some((hashx, value))) => Some((Some(*hashx), *value)),
                _ => self
                    .txs
                    .get(&prevout.tx_hash)?
                    .out_pairs
                    .get(prevout.nout as usize)
                    .copied(),
            })
            .collect()
    }

    fn txs_touching(&self, hashx: &HashX) -> impl Iterator<Item = (&TxHash, &MempoolTx)> {
        let mut hashes: Vec<&TxHash> = self
            .hashxs
            .get(hashx)
            .into_iter()
            .flatten()
            .collect();
        hashes.sort();
        hashes
            .into_iter()
            .filter_map(|hash| self.txs.get(hash).map(|tx| (hash, tx)))
    }

    /// Net unconfirmed change to the balance of `hashx`.
    pub fn balance_delta(&self, hashx: &HashX) -> i64 {
        let mut delta = 0i64;
        for (_, tx) in self.txs_touching(hashx) {
            for (owner, value) in &tx.in_pairs {
                if owner.as_ref() == Some(hashx) {
                    delta -= *value as i64;
                }
            }
            for (owner, value) in &tx.out_pairs {
                if owner.as_ref() == Some(hashx) {
                    delta += *value as i64;
                }
            }
        }
        delta
    }

    /// Summaries of transactions touching `hashx`, ordered by tx hash.
    pub fn transaction_summaries(&self, hashx: &HashX) -> Vec<TxSummary> {
        self.txs_touching(hashx)
            .map(|(tx_hash, tx)| TxSummary {
                tx_hash: *tx_hash,
                fee: tx.fee,
                has_unconfirmed_inputs: self.has_unconfirmed_inputs(tx),
            })
            .collect()
    }

    /// Unconfirmed outputs paying `hashx`, whether or not another mempool
    /// transaction spends them.
    pub fn unordered_utxos(&self, hashx: &HashX) -> Vec<MempoolUtxo> {
        self.txs_touching(hashx)
            .flat_map(|(tx_hash, tx)| {
                tx.out_pairs
                    .iter()
                    .enumerate()
                    .filter(|(_, (owner, _))| owner.as_ref() == Some(hashx))
                    .map(|(nout, (_, value))| MempoolUtxo {
                        tx_hash: *tx_hash,
                        nout: nout as u32,
                        value: *value,
                    })
            })
            .collect()
    }

    /// Outpoints spent by transactions touching `hashx`. A superset of the
    /// address's actual unconfirmed spends.
    pub fn potential_spends(&self, hashx: &HashX) -> BTreeSet<Outpoint> {
        self.txs_touching(hashx)
            .flat_map(|(_, tx)| tx.prevouts.iter().copied())
            .collect()
    }

    pub fn status(&self, tx_hash: &TxHash) -> MempoolStatus {
        match self.txs.get(tx_hash) {
            None => MempoolStatus::Unknown,
            Some(tx) if self.has_unconfirmed_inputs(tx) => MempoolStatus::UnconfirmedParent,
            Some(_) => MempoolStatus::Pending,
        }
    }

    fn has_unconfirmed_inputs(&self, tx: &MempoolTx) -> bool {
        tx.prevouts
            .iter()
            .any(|prevout| self.txs.contains_key(&prevout.tx_hash))
    }

    /// `(fee rate, size)` of every transaction.
    pub fn fee_rates(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.txs
            .values()
            .map(|tx| (tx.fee / tx.size.max(1), tx.size))
    }
}
