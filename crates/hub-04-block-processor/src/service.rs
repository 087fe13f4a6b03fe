//! # Block Processor Service
//!
//! Applies one block at a time to [`HubDb`] and keeps the headers file in
//! step with it.
//!
//! ## Advancing
//!
//! ```text
//! raw block ─► decode ─► begin_block(H)
//!                          │  per transaction, in block order:
//!                          │    spend inputs   (UTXO rows, history of spent owners)
//!                          │    add outputs    (UTXO rows, history of new owners)
//!                          │    claim effects  (ClaimTrieEngine::apply_transaction)
//!                          ▼
//!                  ClaimTrieEngine::finish_block(H)
//!                          ▼
//!              append header ─► commit ─► TouchedSet
//! ```
//!
//! Any error before the commit drops the block transaction, so a failed
//! block leaves no trace. A header appended before a failed commit is
//! truncated again.
//!
//! ## Rewinding
//!
//! [`BlockProcessor::rewind`] replays undo records from the tip down. Rewinds
//! deeper than the database's `reorg_limit` are refused as fatal.

use std::collections::BTreeSet;
use std::sync::Arc;

use hub_01_codec::domain::script::opcodes::is_claim_opcode;
use hub_01_codec::{output_hashx, Block, ClaimOperation, OutputScript};
use hub_02_storage::{
    ChainState, ClaimTrieReader, HeaderStore, HubDb, HubStorage, KeyPrefix, TxLocation,
    UtxoEntry, UtxoReader, UtxoWriter,
};
use hub_03_claimtrie::{ClaimOutput, ClaimTrieEngine, ClaimTx};
use shared_types::{BlockHash, ClaimHash, HashX, Height, Outpoint, HASHX_LEN, HEADER_SIZE};
use tracing::{debug, info, warn};

use crate::domain::errors::BlockProcessorError;
use crate::domain::touched::{BlockStats, RewindSummary, TouchedSet};

/// Serialized block ingestion over the hub's storage.
pub struct BlockProcessor {
    db: Arc<HubDb>,
    headers: Arc<dyn HeaderStore>,
    engine: ClaimTrieEngine,
}

impl BlockProcessor {
    pub fn new(db: Arc<HubDb>, headers: Arc<dyn HeaderStore>, engine: ClaimTrieEngine) -> Self {
        Self {
            db,
            headers,
            engine,
        }
    }

    pub fn from_storage(storage: &HubStorage, engine: ClaimTrieEngine) -> Self {
        Self::new(storage.db.clone(), storage.headers.clone(), engine)
    }

    pub fn db(&self) -> &Arc<HubDb> {
        &self.db
    }

    pub fn headers(&self) -> &Arc<dyn HeaderStore> {
        &self.headers
    }

    /// Committed tip height, `None` before genesis.
    pub fn height(&self) -> Result<Option<Height>, BlockProcessorError> {
        Ok(self.db.chain_state()?.map(|state| state.height))
    }

    /// Height the next block must have.
    pub fn next_height(&self) -> Result<Height, BlockProcessorError> {
        Ok(self.height()?.map_or(0, |h| h + 1))
    }

    pub fn tip(&self) -> Result<Option<BlockHash>, BlockProcessorError> {
        Ok(self.db.tip_hash()?)
    }

    /// Whether a block whose parent is `prev_hash` fails to extend the tip.
    pub fn detect_reorg(&self, prev_hash: &BlockHash) -> Result<bool, BlockProcessorError> {
        Ok(self.tip()?.is_some_and(|tip| &tip != prev_hash))
    }

    /// Decode and apply the next block, all or nothing.
    pub fn advance_block(&self, raw: &[u8]) -> Result<TouchedSet, BlockProcessorError> {
        let prior = self.db.chain_state()?;
        let height = prior.map_or(0, |state| state.height + 1);
        let block =
            Block::decode(raw).map_err(|source| BlockProcessorError::Codec { height, source })?;
        if let Some(state) = prior {
            if block.header.prev_block_hash != state.tip {
                return Err(BlockProcessorError::NotOnTip {
                    height,
                    tip: state.tip,
                });
            }
        }
        let stored_headers = self.headers.count();
        if stored_headers != height {
            return Err(BlockProcessorError::Integrity {
                height,
                detail: format!("headers file holds {stored_headers} headers"),
            });
        }

        let block_hash = block.header.hash();
        let mut txn = self.db.begin_block(height)?;
        let mut claims = self.engine.begin_block(height);
        let mut touched = TouchedSet {
            height,
            block_hash,
            ..Default::default()
        };
        let mut stats = BlockStats {
            tx_count: block.transactions.len(),
            ..Default::default()
        };
        let mut utxo_count = prior.map_or(0, |state| state.utxo_count);
        let mut tx_hashes = Vec::with_capacity(block.transactions.len());

        for (position, tx) in block.transactions.iter().enumerate() {
            let tx_hash = tx.txid();
            let location = TxLocation {
                height,
                position: position as u32,
            };
            let mut tx_hashxs: BTreeSet<HashX> = BTreeSet::new();
            let mut claim_tx = ClaimTx {
                tx_hash,
                position: position as u32,
                ..Default::default()
            };

            if tx.is_coinbase() {
                stats.coinbase_value = stats.coinbase_value.saturating_add(tx.output_value());
            } else {
                let mut input_value = 0u64;
                for input in &tx.inputs {
                    let spent = txn.spend_utxo(&input.prev_out)?.ok_or(
                        BlockProcessorError::MissingInput {
                            height,
                            outpoint: input.prev_out,
                        },
                    )?;
                    input_value = input_value.saturating_add(spent.value);
                    utxo_count = utxo_count.saturating_sub(1);
                    tx_hashxs.insert(spent.hashx);
                    claim_tx.spent.push(input.prev_out);
                }
                stats.value_spent = stats.value_spent.saturating_add(input_value);
                stats.fees = stats
                    .fees
                    .saturating_add(input_value.saturating_sub(tx.output_value()));
            }

            for (nout, output) in tx.outputs.iter().enumerate() {
                let outpoint = Outpoint::new(tx_hash, nout as u32);
                match output_hashx(&output.script) {
                    Some(hashx) => {
                        txn.add_utxo(
                            &outpoint,
                            UtxoEntry {
                                hashx,
                                value: output.value,
                            },
                        );
                        utxo_count += 1;
                        stats.value_created = stats.value_created.saturating_add(output.value);
                        tx_hashxs.insert(hashx);
                    }
                    None => {
                        stats.value_burned = stats.value_burned.saturating_add(output.value);
                    }
                }
                if let Some(operation) = claim_operation(&output.script, &outpoint) {
                    claim_tx.outputs.push(ClaimOutput {
                        nout: nout as u32,
                        amount: output.value,
                        operation,
                    });
                }
            }

            for hashx in &tx_hashxs {
                txn.add_history(hashx, location, &tx_hash);
            }
            txn.put_tx(&tx_hash, location, &tx.encode());
            if !claim_tx.spent.is_empty() || !claim_tx.outputs.is_empty() {
                self.engine
                    .apply_transaction(&mut txn, &mut claims, &claim_tx)?;
            }
            touched.hashxs.extend(tx_hashxs);
            tx_hashes.push(tx_hash);
        }

        txn.put_block_tx_hashes(height, &tx_hashes);
        let summary = self.engine.finish_block(&mut txn, claims)?;
        txn.put_chain_state(&ChainState {
            height,
            tip: block_hash,
            tx_count: prior.map_or(0, |state| state.tx_count) + tx_hashes.len() as u64,
            utxo_count,
        })?;

        self.headers.append(&raw[..HEADER_SIZE])?;
        let commit = match txn.commit() {
            Ok(commit) => commit,
            Err(err) => {
                if let Err(truncate) = self.headers.truncate(height) {
                    warn!(height, error = %truncate, "Could not drop header of failed block");
                }
                return Err(err.into());
            }
        };

        touched.claims = summary.touched_claims;
        touched.takeovers = summary.takeovers;
        touched.stats = stats;
        debug!(
            height,
            txs = stats.tx_count,
            keys = commit.keys_changed,
            hashxs = touched.hashxs.len(),
            claims = touched.claims.len(),
            "Advanced block"
        );
        Ok(touched)
    }

    /// Remove every block above `to_height`.
    pub fn rewind(&self, to_height: Height) -> Result<RewindSummary, BlockProcessorError> {
        let tip = match self.height()? {
            Some(tip) if tip > to_height => tip,
            Some(tip) => {
                return Ok(RewindSummary {
                    from_height: tip,
                    to_height: tip,
                    ..Default::default()
                })
            }
            None => return Ok(RewindSummary::default()),
        };
        let depth = tip - to_height;
        let limit = self.db.reorg_limit();
        if depth > limit {
            return Err(BlockProcessorError::ReorgLimitExceeded { tip, depth, limit });
        }

        let mut summary = RewindSummary {
            from_height: tip,
            to_height,
            ..Default::default()
        };
        for height in (to_height + 1..=tip).rev() {
            let undo = self.db.rewind_block(height)?;
            summary.hashxs.extend(
                undo.keys_in(KeyPrefix::History)
                    .filter_map(|key| key.get(1..1 + HASHX_LEN))
                    .filter_map(HashX::from_slice),
            );
            summary.claims.extend(
                undo.keys_in(KeyPrefix::Claim)
                    .filter_map(|key| key.get(1..21))
                    .filter_map(|bytes| <[u8; 20]>::try_from(bytes).ok())
                    .map(ClaimHash),
            );
            self.headers.truncate(height)?;
        }
        info!(
            from = tip,
            to = to_height,
            hashxs = summary.hashxs.len(),
            claims = summary.claims.len(),
            "Rewound chain"
        );
        Ok(summary)
    }
}

/// Claim operation of an output script, if any. Unparseable claim scripts
/// are ordinary outputs.
fn claim_operation(script: &[u8], outpoint: &Outpoint) -> Option<ClaimOperation> {
    match OutputScript::parse(script) {
        Ok(parsed) => parsed.claim().cloned(),
        Err(err) => {
            if script.first().is_some_and(|op| is_claim_opcode(*op)) {
                debug!(%outpoint, error = %err, "Unparseable claim script");
            }
            None
        }
    }
}
