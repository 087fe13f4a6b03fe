//! # Claim-Trie Engine
//!
//! Two phases per block.
//!
//! **Raw rows** ([`ClaimTrieEngine::apply_transaction`], once per
//! transaction in block order): spent claim outpoints are abandons unless
//! the same transaction carries a valid update; spent support outpoints drop
//! the support; claim, update and support outputs write their rows.
//!
//! **Trie** ([`ClaimTrieEngine::finish_block`], once per block), over every
//! touched name in name order:
//!
//! 0. expire claims whose expiration height is reached
//! 1. uncontested takeover for a lone claim on a fresh name
//! 2. trending amount (supports younger than the trending window)
//! 3. effective amount (amount plus all live supports)
//! 4. activation heights for claims that lack one
//! 5. takeover resolution
//! 6. steps 3 and 5 once more for names that changed hands

use std::collections::{BTreeMap, BTreeSet};

use hub_01_codec::{ClaimKind, ClaimOperation, ClaimValue};
use hub_02_storage::{ClaimRecord, ClaimTrieEntry, SupportRecord};
use shared_types::{expiration_height, normalize_name, ClaimHash, Height, Outpoint};
use tracing::{debug, trace};

use crate::domain::changes::{ClaimBlockSummary, ClaimOutput, ClaimTx, Takeover};
use crate::domain::errors::ClaimTrieError;
use crate::domain::invariants::check_name;
use crate::domain::ordering::pick_winner;
use crate::domain::params::EngineParams;
use crate::ports::outbound::ClaimStore;

/// Changes accumulated over one block's transactions.
#[derive(Debug)]
pub struct BlockClaimState {
    height: Height,
    touched_names: BTreeSet<String>,
    touched_claims: BTreeSet<ClaimHash>,
    /// Claims whose support set changed this block.
    supported_claims: BTreeSet<ClaimHash>,
    abandoned: Vec<ClaimHash>,
}

impl BlockClaimState {
    pub fn height(&self) -> Height {
        self.height
    }

    fn touch(&mut self, claim: &ClaimRecord) {
        self.touched_names.insert(claim.name.clone());
        self.touched_claims.insert(claim.claim_hash);
    }
}

/// The takeover state machine. Stateless apart from its parameters.
#[derive(Debug, Clone, Default)]
pub struct ClaimTrieEngine {
    params: EngineParams,
}

impl ClaimTrieEngine {
    pub fn new(params: EngineParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn begin_block(&self, height: Height) -> BlockClaimState {
        BlockClaimState {
            height,
            touched_names: BTreeSet::new(),
            touched_claims: BTreeSet::new(),
            supported_claims: BTreeSet::new(),
            abandoned: Vec::new(),
        }
    }

    // =========================================================================
    // PHASE 1: RAW ROWS
    // =========================================================================

    /// Apply one transaction's claim, update, support and spend effects.
    pub fn apply_transaction<S: ClaimStore + ?Sized>(
        &self,
        store: &mut S,
        block: &mut BlockClaimState,
        tx: &ClaimTx,
    ) -> Result<(), ClaimTrieError> {
        // Spent claims stay pending until the outputs show whether this is
        // an update or an abandon.
        let mut spent_claims: BTreeMap<ClaimHash, ClaimRecord> = BTreeMap::new();
        for outpoint in &tx.spent {
            if let Some(claim_hash) = store.claim_hash_at_outpoint(outpoint)? {
                let claim = store
                    .get_claim(&claim_hash)?
                    .ok_or(ClaimTrieError::MissingClaim(claim_hash))?;
                spent_claims.insert(claim_hash, claim);
            } else if let Some(support) = store.delete_support(outpoint)? {
                self.touch_supported(&*store, block, &support.claim_hash)?;
            }
        }

        for output in &tx.outputs {
            let outpoint = Outpoint::new(tx.tx_hash, output.nout);
            match &output.operation {
                ClaimOperation::ClaimName { name, value } => {
                    let claim =
                        self.new_claim(block.height, tx.position, outpoint, output, name, value);
                    trace!(claim = %claim.claim_hash, name = %claim.name, "Claim created");
                    store.put_claim(&claim)?;
                    block.touch(&claim);
                }
                ClaimOperation::UpdateClaim {
                    name,
                    claim_hash,
                    value,
                } => {
                    let normalized = normalize_name(&String::from_utf8_lossy(name));
                    match spent_claims.remove(claim_hash) {
                        Some(prior) if prior.name == normalized => {
                            let claim = self.updated_claim(
                                &*store,
                                block.height,
                                tx.position,
                                outpoint,
                                output,
                                prior,
                                name,
                                value,
                            )?;
                            trace!(claim = %claim.claim_hash, "Claim updated");
                            store.put_claim(&claim)?;
                            block.touch(&claim);
                        }
                        Some(prior) => {
                            debug!(claim = %claim_hash, %normalized, "Update renames claim, ignored");
                            spent_claims.insert(*claim_hash, prior);
                        }
                        None => {
                            debug!(claim = %claim_hash, "Update without spending the claim, ignored");
                        }
                    }
                }
                ClaimOperation::SupportClaim { claim_hash, .. } => {
                    store.put_support(&SupportRecord {
                        outpoint,
                        claim_hash: *claim_hash,
                        amount: output.amount,
                        height: block.height,
                    })?;
                    self.touch_supported(&*store, block, claim_hash)?;
                }
            }
        }

        for (claim_hash, claim) in spent_claims {
            debug!(claim = %claim_hash, name = %claim.name, "Claim abandoned");
            self.remove_claim(store, block, &claim)?;
            block.abandoned.push(claim_hash);
        }
        Ok(())
    }

    fn new_claim(
        &self,
        height: Height,
        tx_position: u32,
        outpoint: Outpoint,
        output: &ClaimOutput,
        name: &[u8],
        value: &[u8],
    ) -> ClaimRecord {
        let original_name = String::from_utf8_lossy(name).into_owned();
        let (kind, channel_hash) = classify_value(value);
        ClaimRecord {
            claim_hash: ClaimHash::from_outpoint(&outpoint),
            name: normalize_name(&original_name),
            original_name,
            outpoint,
            tx_position,
            amount: output.amount,
            effective_amount: output.amount,
            support_amount: 0,
            trending_amount: 0,
            height,
            update_height: height,
            activation_height: None,
            expiration_height: expiration_height(height),
            channel_hash,
            kind,
            value: value.to_vec(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn updated_claim<S: ClaimStore + ?Sized>(
        &self,
        store: &S,
        height: Height,
        tx_position: u32,
        outpoint: Outpoint,
        output: &ClaimOutput,
        prior: ClaimRecord,
        name: &[u8],
        value: &[u8],
    ) -> Result<ClaimRecord, ClaimTrieError> {
        let controlling = store
            .get_trie_entry(&prior.name)?
            .is_some_and(|entry| entry.claim_hash == prior.claim_hash);
        let (kind, channel_hash) = classify_value(value);
        Ok(ClaimRecord {
            original_name: String::from_utf8_lossy(name).into_owned(),
            outpoint,
            tx_position,
            amount: output.amount,
            update_height: height,
            expiration_height: expiration_height(height),
            // The controlling claim stays active; others wait again.
            activation_height: if controlling {
                prior.activation_height
            } else {
                None
            },
            channel_hash,
            kind,
            value: value.to_vec(),
            ..prior
        })
    }

    fn touch_supported<S: ClaimStore + ?Sized>(
        &self,
        store: &S,
        block: &mut BlockClaimState,
        claim_hash: &ClaimHash,
    ) -> Result<(), ClaimTrieError> {
        block.supported_claims.insert(*claim_hash);
        block.touched_claims.insert(*claim_hash);
        if let Some(claim) = store.get_claim(claim_hash)? {
            block.touched_names.insert(claim.name);
        }
        Ok(())
    }

    /// Delete a claim and every support pointing at it.
    fn remove_claim<S: ClaimStore + ?Sized>(
        &self,
        store: &mut S,
        block: &mut BlockClaimState,
        claim: &ClaimRecord,
    ) -> Result<(), ClaimTrieError> {
        for support in store.get_supports(&claim.claim_hash)? {
            store.delete_support(&support.outpoint)?;
        }
        store.delete_claim(&claim.claim_hash)?;
        block.touch(claim);
        Ok(())
    }

    // =========================================================================
    // PHASE 2: TRIE
    // =========================================================================

    /// Run the per-name steps for the block and report what changed.
    pub fn finish_block<S: ClaimStore + ?Sized>(
        &self,
        store: &mut S,
        mut block: BlockClaimState,
    ) -> Result<ClaimBlockSummary, ClaimTrieError> {
        let height = block.height;
        let mut summary = ClaimBlockSummary {
            height,
            ..Default::default()
        };

        // Step 0: expirations behave like abandons.
        for claim_hash in store.claims_expiring_at(height)? {
            if let Some(claim) = store.get_claim(&claim_hash)? {
                debug!(claim = %claim_hash, name = %claim.name, "Claim expired");
                self.remove_claim(store, &mut block, &claim)?;
                summary.expired.push(claim_hash);
            }
        }

        // Delayed activations reaching this height.
        for claim_hash in store.claims_activating_at(height)? {
            if let Some(claim) = store.get_claim(&claim_hash)? {
                block.touched_names.insert(claim.name);
            }
        }

        // Supports entering or leaving the trending window.
        let mut trending = block.supported_claims.clone();
        trending.extend(store.supports_at_height(height)?.iter().map(|s| s.claim_hash));
        if height >= self.params.trending_blocks {
            let aged = store.supports_at_height(height - self.params.trending_blocks)?;
            trending.extend(aged.iter().map(|s| s.claim_hash));
        }

        let names: Vec<String> = block.touched_names.iter().cloned().collect();

        // Step 1
        for name in &names {
            self.uncontested_takeover(store, &mut block, &mut summary, name)?;
        }

        // Steps 2 and 3
        let mut refresh: BTreeSet<ClaimHash> = trending;
        for name in &names {
            refresh.extend(store.claim_hashes_by_name(name)?);
        }
        for claim_hash in &refresh {
            self.refresh_amounts(store, &mut block, claim_hash)?;
        }

        // Step 4
        for name in &names {
            self.assign_activations(store, &mut block, name)?;
        }

        // Step 5
        let mut changed_hands = Vec::new();
        for name in &names {
            if self.resolve_takeover(store, &mut block, &mut summary, name)? {
                changed_hands.push(name.clone());
            }
        }

        // Step 6: one extra pass; the takeover may have activated claims
        // that now outrank the new winner.
        for name in &changed_hands {
            for claim_hash in store.claim_hashes_by_name(name)? {
                self.refresh_amounts(store, &mut block, &claim_hash)?;
            }
            self.resolve_takeover(store, &mut block, &mut summary, name)?;
        }

        for name in &names {
            if let Some(violation) = check_name(&*store, name, height)?.into_iter().next() {
                return Err(ClaimTrieError::Integrity {
                    height,
                    detail: violation.to_string(),
                });
            }
        }

        summary.touched_claims = block.touched_claims;
        summary.touched_names = block.touched_names;
        summary.abandoned = block.abandoned;
        if !summary.takeovers.is_empty() {
            debug!(height, takeovers = summary.takeovers.len(), "Claim trie updated");
        }
        Ok(summary)
    }

    fn uncontested_takeover<S: ClaimStore + ?Sized>(
        &self,
        store: &mut S,
        block: &mut BlockClaimState,
        summary: &mut ClaimBlockSummary,
        name: &str,
    ) -> Result<(), ClaimTrieError> {
        if store.get_trie_entry(name)?.is_some() {
            return Ok(());
        }
        let mut claims = store.get_claims_by_name(name)?;
        if claims.len() != 1 {
            return Ok(());
        }
        let mut claim = claims.remove(0);
        claim.activation_height = Some(block.height);
        store.put_claim(&claim)?;
        store.put_trie_entry(&ClaimTrieEntry {
            name: name.to_string(),
            claim_hash: claim.claim_hash,
            last_take_over_height: block.height,
        })?;
        block.touch(&claim);
        summary.takeovers.push(Takeover {
            name: name.to_string(),
            from: None,
            to: Some(claim.claim_hash),
            height: block.height,
        });
        Ok(())
    }

    fn refresh_amounts<S: ClaimStore + ?Sized>(
        &self,
        store: &mut S,
        block: &mut BlockClaimState,
        claim_hash: &ClaimHash,
    ) -> Result<(), ClaimTrieError> {
        let Some(mut claim) = store.get_claim(claim_hash)? else {
            return Ok(());
        };
        let supports = store.get_supports(claim_hash)?;
        let support_amount: u64 = supports.iter().map(|s| s.amount).sum();
        let trending_amount: u64 = supports
            .iter()
            .filter(|s| self.params.is_trending(s.height, block.height))
            .map(|s| s.amount)
            .sum();
        let effective_amount = claim.amount + support_amount;
        if (claim.support_amount, claim.trending_amount, claim.effective_amount)
            != (support_amount, trending_amount, effective_amount)
        {
            claim.support_amount = support_amount;
            claim.trending_amount = trending_amount;
            claim.effective_amount = effective_amount;
            store.put_claim(&claim)?;
            block.touch(&claim);
        }
        Ok(())
    }

    fn assign_activations<S: ClaimStore + ?Sized>(
        &self,
        store: &mut S,
        block: &mut BlockClaimState,
        name: &str,
    ) -> Result<(), ClaimTrieError> {
        let last_take_over = store
            .get_trie_entry(name)?
            .map(|entry| entry.last_take_over_height);
        for mut claim in store.get_claims_by_name(name)? {
            if claim.activation_height.is_none() {
                let activation = self.params.activation_height(block.height, last_take_over);
                trace!(claim = %claim.claim_hash, activation, "Activation assigned");
                claim.activation_height = Some(activation);
                store.put_claim(&claim)?;
                block.touch(&claim);
            }
        }
        Ok(())
    }

    /// Returns whether control of `name` changed.
    fn resolve_takeover<S: ClaimStore + ?Sized>(
        &self,
        store: &mut S,
        block: &mut BlockClaimState,
        summary: &mut ClaimBlockSummary,
        name: &str,
    ) -> Result<bool, ClaimTrieError> {
        let height = block.height;
        let claims = store.get_claims_by_name(name)?;
        let entry = store.get_trie_entry(name)?;
        let incumbent = entry.as_ref().map(|e| e.claim_hash);

        if claims.is_empty() {
            if entry.is_some() {
                store.delete_trie_entry(name);
                summary.takeovers.push(Takeover {
                    name: name.to_string(),
                    from: incumbent,
                    to: None,
                    height,
                });
                return Ok(true);
            }
            return Ok(false);
        }

        // With the controlling claim gone, every claim of the name competes.
        let incumbent_live =
            incumbent.is_some_and(|hash| claims.iter().any(|c| c.claim_hash == hash));
        let candidates: Vec<ClaimRecord> = if incumbent_live {
            claims.iter().filter(|c| c.is_active_at(height)).cloned().collect()
        } else {
            claims.clone()
        };
        let Some(winner) = pick_winner(&candidates, incumbent.as_ref()) else {
            return Ok(false);
        };
        if Some(winner.claim_hash) == incumbent {
            return Ok(false);
        }

        let winner_hash = winner.claim_hash;
        debug!(%name, from = ?incumbent, to = %winner_hash, height, "Takeover");
        store.put_trie_entry(&ClaimTrieEntry {
            name: name.to_string(),
            claim_hash: winner_hash,
            last_take_over_height: height,
        })?;
        for mut claim in claims {
            if claim.activation_height.map_or(true, |h| h > height) {
                claim.activation_height = Some(height);
                store.put_claim(&claim)?;
                block.touch(&claim);
            }
        }
        block.touched_claims.insert(winner_hash);
        if let Some(previous) = incumbent {
            block.touched_claims.insert(previous);
        }
        summary.takeovers.push(Takeover {
            name: name.to_string(),
            from: incumbent,
            to: Some(winner_hash),
            height,
        });
        Ok(true)
    }
}

/// Kind and signing channel from a claim value; undecodable values are
/// kept as unknown, unsigned claims.
fn classify_value(value: &[u8]) -> (ClaimKind, Option<ClaimHash>) {
    match ClaimValue::decode(value) {
        Ok(decoded) => (decoded.kind, decoded.signing_channel),
        Err(err) => {
            debug!(%err, "Undecodable claim value");
            (ClaimKind::Unknown, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invariants::check_invariants;
    use hub_02_storage::{ClaimTrieReader, HubDb, UtxoWriter};
    use shared_types::TxHash;

    struct Chain {
        db: HubDb,
        engine: ClaimTrieEngine,
        height: Height,
    }

    impl Chain {
        fn new(start: Height) -> Self {
            let db = HubDb::in_memory(1000);
            // Fill the chain state so blocks can start at `start`.
            if start > 0 {
                let mut txn = db.begin_block(0).unwrap();
                txn.put_chain_state(&hub_02_storage::ChainState {
                    height: start - 1,
                    tip: [0u8; 32],
                    tx_count: 0,
                    utxo_count: 0,
                })
                .unwrap();
                txn.commit().unwrap();
            }
            Self {
                db,
                engine: ClaimTrieEngine::default(),
                height: start,
            }
        }

        fn block(&mut self, txs: Vec<ClaimTx>) -> ClaimBlockSummary {
            let height = self.height;
            let mut txn = self.db.begin_block(height).unwrap();
            let mut state = self.engine.begin_block(height);
            for tx in &txs {
                self.engine.apply_transaction(&mut txn, &mut state, tx).unwrap();
            }
            let summary = self.engine.finish_block(&mut txn, state).unwrap();
            txn.put_chain_state(&hub_02_storage::ChainState {
                height,
                tip: [height as u8; 32],
                tx_count: 0,
                utxo_count: 0,
            })
            .unwrap();
            txn.commit().unwrap();
            assert!(check_invariants(&self.db, height).unwrap().is_empty());
            self.height += 1;
            summary
        }

        /// Continue the chain at `height`, as if the blocks in between were empty.
        fn skip_to(&mut self, height: Height) {
            let mut txn = self.db.begin_block(self.height).unwrap();
            txn.put_chain_state(&hub_02_storage::ChainState {
                height: height - 1,
                tip: [0u8; 32],
                tx_count: 0,
                utxo_count: 0,
            })
            .unwrap();
            txn.commit().unwrap();
            self.height = height;
        }

        fn controlling(&self, name: &str) -> Option<ClaimHash> {
            self.db.get_trie_entry(name).unwrap().map(|e| e.claim_hash)
        }

        fn claim(&self, hash: &ClaimHash) -> ClaimRecord {
            self.db.get_claim(hash).unwrap().unwrap()
        }
    }

    fn txid(seed: u8) -> TxHash {
        [seed; 32]
    }

    fn claim_tx(seed: u8, name: &str, amount: u64) -> (ClaimTx, ClaimHash) {
        let tx = ClaimTx {
            tx_hash: txid(seed),
            position: 1,
            spent: vec![],
            outputs: vec![ClaimOutput {
                nout: 0,
                amount,
                operation: ClaimOperation::ClaimName {
                    name: name.as_bytes().to_vec(),
                    value: ClaimValue::unsigned(ClaimKind::Stream, b"v").encode(),
                },
            }],
        };
        (tx, ClaimHash::from_outpoint(&Outpoint::new(txid(seed), 0)))
    }

    fn support_tx(seed: u8, claim_hash: ClaimHash, amount: u64) -> ClaimTx {
        ClaimTx {
            tx_hash: txid(seed),
            position: 1,
            spent: vec![],
            outputs: vec![ClaimOutput {
                nout: 0,
                amount,
                operation: ClaimOperation::SupportClaim {
                    name: b"foo".to_vec(),
                    claim_hash,
                },
            }],
        }
    }

    fn spend_tx(seed: u8, spent: Outpoint) -> ClaimTx {
        ClaimTx {
            tx_hash: txid(seed),
            position: 1,
            spent: vec![spent],
            outputs: vec![],
        }
    }

    #[test]
    fn test_takeover_scenarios() {
        let mut chain = Chain::new(100);

        // Uncontested claim at 100.
        let (tx, a) = claim_tx(1, "foo", 10);
        let summary = chain.block(vec![tx]);
        assert_eq!(chain.controlling("foo"), Some(a));
        assert_eq!(chain.claim(&a).activation_height, Some(100));
        assert_eq!(summary.takeovers.len(), 1);

        // Larger claim at 101 takes over with no delay.
        let (tx, b) = claim_tx(2, "foo", 50);
        chain.block(vec![tx]);
        assert_eq!(chain.claim(&b).activation_height, Some(101));
        assert_eq!(chain.controlling("foo"), Some(b));
        assert_eq!(
            chain.db.get_trie_entry("foo").unwrap().unwrap().last_take_over_height,
            101
        );

        // Support of 45 swings it back to A at 102.
        chain.block(vec![support_tx(3, a, 45)]);
        assert_eq!(chain.claim(&a).effective_amount, 55);
        assert_eq!(chain.controlling("foo"), Some(a));

        // Abandoning B leaves A in control.
        chain.block(vec![spend_tx(4, Outpoint::new(txid(2), 0))]);
        assert!(chain.db.get_claim(&b).unwrap().is_none());
        assert_eq!(chain.controlling("foo"), Some(a));
    }

    #[test]
    fn test_abandoning_controlling_claim_elects_runner_up() {
        let mut chain = Chain::new(100);
        let (tx, a) = claim_tx(1, "foo", 10);
        chain.block(vec![tx]);
        let (tx, b) = claim_tx(2, "foo", 50);
        chain.block(vec![tx]);
        assert_eq!(chain.controlling("foo"), Some(b));

        let summary = chain.block(vec![spend_tx(3, Outpoint::new(txid(2), 0))]);
        assert_eq!(chain.controlling("foo"), Some(a));
        assert_eq!(summary.abandoned, vec![b]);
    }

    #[test]
    fn test_abandoning_last_claim_clears_entry() {
        let mut chain = Chain::new(10);
        let (tx, _) = claim_tx(1, "solo", 10);
        chain.block(vec![tx]);
        chain.block(vec![spend_tx(2, Outpoint::new(txid(1), 0))]);
        assert_eq!(chain.controlling("solo"), None);
    }

    #[test]
    fn test_delayed_activation_then_takeover() {
        let mut chain = Chain::new(1000);
        let (tx, a) = claim_tx(1, "foo", 10);
        chain.block(vec![tx]);
        chain.skip_to(1320);

        // 320 blocks after the takeover: delay of 10.
        let (tx, b) = claim_tx(2, "foo", 50);
        chain.block(vec![tx]);
        assert_eq!(chain.claim(&b).activation_height, Some(1330));
        assert_eq!(chain.controlling("foo"), Some(a));

        while chain.height < 1330 {
            chain.block(vec![]);
            assert_eq!(chain.controlling("foo"), Some(a));
        }
        chain.block(vec![]);
        assert_eq!(chain.controlling("foo"), Some(b));
    }

    #[test]
    fn test_takeover_activates_pending_claim_that_wins_same_block() {
        let mut chain = Chain::new(1000);
        let (tx, a) = claim_tx(1, "foo", 10);
        chain.block(vec![tx]);
        chain.skip_to(1320);

        let (tx, c) = claim_tx(2, "foo", 30);
        chain.block(vec![tx]);
        assert_eq!(chain.claim(&c).activation_height, Some(1330));
        let (tx, b) = claim_tx(3, "foo", 100);
        chain.block(vec![tx]);
        assert_eq!(chain.claim(&b).activation_height, Some(1331));

        while chain.height < 1330 {
            chain.block(vec![]);
            assert_eq!(chain.controlling("foo"), Some(a));
        }
        // C takes over at 1330, which activates B early, and B wins.
        let summary = chain.block(vec![]);
        assert_eq!(chain.controlling("foo"), Some(b));
        let entry = chain.db.get_trie_entry("foo").unwrap().unwrap();
        assert_eq!(entry.last_take_over_height, 1330);
        assert_eq!(chain.claim(&b).activation_height, Some(1330));
        assert!(!summary.takeovers.is_empty());
    }

    #[test]
    fn test_support_cascade_and_trending_window() {
        let mut chain = Chain::new(10);
        let (tx, a) = claim_tx(1, "foo", 10);
        chain.block(vec![tx]);
        chain.block(vec![support_tx(2, a, 5)]);
        assert_eq!(chain.claim(&a).trending_amount, 5);
        assert_eq!(chain.claim(&a).support_amount, 5);

        // Spending the support removes it.
        chain.block(vec![spend_tx(3, Outpoint::new(txid(2), 0))]);
        assert_eq!(chain.claim(&a).effective_amount, 10);
        assert_eq!(chain.claim(&a).trending_amount, 0);

        // Abandon with a live support drops the support too.
        chain.block(vec![support_tx(4, a, 7)]);
        chain.block(vec![spend_tx(5, Outpoint::new(txid(1), 0))]);
        assert!(chain.db.get_supports(&a).unwrap().is_empty());
    }

    #[test]
    fn test_update_keeps_identity_and_control() {
        let mut chain = Chain::new(10);
        let (tx, a) = claim_tx(1, "foo", 10);
        chain.block(vec![tx]);
        let update = ClaimTx {
            tx_hash: txid(2),
            position: 3,
            spent: vec![Outpoint::new(txid(1), 0)],
            outputs: vec![ClaimOutput {
                nout: 1,
                amount: 30,
                operation: ClaimOperation::UpdateClaim {
                    name: b"FOO".to_vec(),
                    claim_hash: a,
                    value: ClaimValue::unsigned(ClaimKind::Repost, b"r").encode(),
                },
            }],
        };
        chain.block(vec![update]);
        let claim = chain.claim(&a);
        assert_eq!(claim.outpoint, Outpoint::new(txid(2), 1));
        assert_eq!(claim.amount, 30);
        assert_eq!(claim.height, 10);
        assert_eq!(claim.update_height, 11);
        assert_eq!(claim.kind, ClaimKind::Repost);
        assert_eq!(chain.controlling("foo"), Some(a));
    }

    #[test]
    fn test_update_of_unspent_claim_is_ignored() {
        let mut chain = Chain::new(10);
        let (tx, a) = claim_tx(1, "foo", 10);
        chain.block(vec![tx]);
        let bogus = ClaimTx {
            tx_hash: txid(2),
            position: 1,
            spent: vec![],
            outputs: vec![ClaimOutput {
                nout: 0,
                amount: 99,
                operation: ClaimOperation::UpdateClaim {
                    name: b"foo".to_vec(),
                    claim_hash: a,
                    value: vec![0x00],
                },
            }],
        };
        chain.block(vec![bogus]);
        assert_eq!(chain.claim(&a).amount, 10);
    }

    #[test]
    fn test_names_are_normalized() {
        let mut chain = Chain::new(10);
        let (tx, a) = claim_tx(1, "Foo", 10);
        chain.block(vec![tx]);
        assert_eq!(chain.controlling("foo"), Some(a));
        assert_eq!(chain.claim(&a).original_name, "Foo");
    }

    #[test]
    fn test_signed_claim_joins_channel_index() {
        let mut chain = Chain::new(10);
        let channel = ClaimHash([0xab; 20]);
        let tx = ClaimTx {
            tx_hash: txid(1),
            position: 1,
            spent: vec![],
            outputs: vec![ClaimOutput {
                nout: 0,
                amount: 1,
                operation: ClaimOperation::ClaimName {
                    name: b"video".to_vec(),
                    value: ClaimValue::signed(ClaimKind::Stream, b"v", channel).encode(),
                },
            }],
        };
        chain.block(vec![tx]);
        assert_eq!(chain.db.claims_in_channel(&channel).unwrap().len(), 1);
    }
}
