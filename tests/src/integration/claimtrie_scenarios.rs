//! # Claim Trie Scenarios
//!
//! Takeovers driven by real blocks: claim outputs, supports and spends go
//! through the block processor exactly as the sync service feeds them.
//!
//! After every block the trie invariants hold: at most one controlling
//! claim per name, effective amounts equal amount plus active supports,
//! and activation never precedes creation.

#[cfg(test)]
mod tests {
    use hub_03_claimtrie::Takeover;
    use shared_types::Outpoint;

    use crate::integration::chain::{
        abandon_tx, claim_tx, support_tx, ChainBuilder, Node, ALICE, BOB, CAROL, COINBASE_VALUE,
        FEE,
    };

    // =========================================================================
    // FIXTURES
    // =========================================================================

    /// Heights 0..=99 of empty blocks, indexed.
    fn chain_at_100() -> (ChainBuilder, Node) {
        let chain = ChainBuilder::with_empty_blocks(100);
        let node = Node::synced_to(&chain, 200);
        (chain, node)
    }

    fn minted(node: &Node) -> u64 {
        COINBASE_VALUE * (u64::from(node.height()) + 1)
    }

    // =========================================================================
    // TAKEOVER SEQUENCE
    // =========================================================================

    #[test]
    fn test_claim_takeover_support_abandon_sequence() {
        let (mut chain, node) = chain_at_100();

        // Height 100: A claims "foo" uncontested.
        let (tx, a) = claim_tx(chain.coinbase(1), "foo", 10, ALICE);
        let touched = node.apply(&chain.block(vec![tx]));
        assert_eq!(touched.height, 100);
        assert_eq!(node.controlling("foo"), Some(a));
        assert_eq!(node.claim(&a).unwrap().activation_height, Some(100));
        assert_eq!(node.last_take_over("foo"), Some(100));
        assert!(touched.claims.contains(&a));
        node.assert_invariants();

        // Height 101: B claims 50. One block since the takeover gives no
        // delay, so B activates and takes over in the same block.
        let (b_tx, b) = claim_tx(chain.coinbase(2), "foo", 50, BOB);
        let touched = node.apply(&chain.block(vec![b_tx.clone()]));
        assert_eq!(node.claim(&b).unwrap().activation_height, Some(101));
        assert_eq!(node.controlling("foo"), Some(b));
        assert_eq!(node.last_take_over("foo"), Some(101));
        assert_eq!(
            touched.takeovers,
            vec![Takeover {
                name: "foo".into(),
                from: Some(a),
                to: Some(b),
                height: 101,
            }]
        );
        node.assert_invariants();

        // Height 102: a support of 45 lifts A to 55 and back into control.
        node.apply(&chain.block(vec![support_tx(chain.coinbase(3), "foo", &a, 45, CAROL)]));
        let a_record = node.claim(&a).unwrap();
        assert_eq!(a_record.effective_amount, 55);
        assert_eq!(a_record.support_amount, 45);
        assert_eq!(node.controlling("foo"), Some(a));
        assert_eq!(node.last_take_over("foo"), Some(102));
        node.assert_invariants();

        // Height 103: abandoning B, no longer controlling, changes nothing
        // for A.
        let touched = node.apply(&chain.block(vec![abandon_tx(
            Outpoint::new(b_tx.txid(), 0),
            50,
            BOB,
        )]));
        assert!(touched.claims.contains(&b));
        assert_eq!(node.claim(&b), None);
        assert_eq!(node.controlling("foo"), Some(a));
        assert_eq!(node.last_take_over("foo"), Some(102));
        node.assert_invariants();

        // Four transactions, one fee each.
        assert_eq!(node.utxo_total(), minted(&node) - 4 * FEE);
    }

    #[test]
    fn test_abandoning_controlling_claim_elects_next_best() {
        let (mut chain, node) = chain_at_100();
        let (tx, a) = claim_tx(chain.coinbase(1), "foo", 10, ALICE);
        node.apply(&chain.block(vec![tx]));
        let (b_tx, b) = claim_tx(chain.coinbase(2), "foo", 50, BOB);
        node.apply(&chain.block(vec![b_tx.clone()]));
        assert_eq!(node.controlling("foo"), Some(b));

        let touched = node.apply(&chain.block(vec![abandon_tx(
            Outpoint::new(b_tx.txid(), 0),
            50,
            BOB,
        )]));
        assert_eq!(node.controlling("foo"), Some(a));
        assert_eq!(node.last_take_over("foo"), Some(102));
        assert_eq!(touched.takeovers.len(), 1);
        assert_eq!(touched.takeovers[0].to, Some(a));
        node.assert_invariants();
    }

    #[test]
    fn test_abandoning_only_claim_clears_name() {
        let (mut chain, node) = chain_at_100();
        let (tx, _) = claim_tx(chain.coinbase(1), "solo", 100, ALICE);
        node.apply(&chain.block(vec![tx.clone()]));
        node.apply(&chain.block(vec![abandon_tx(Outpoint::new(tx.txid(), 0), 100, ALICE)]));

        assert_eq!(node.controlling("solo"), None);
        assert_eq!(node.last_take_over("solo"), None);
        node.assert_invariants();
    }

    // =========================================================================
    // SUPPORTS
    // =========================================================================

    #[test]
    fn test_spent_support_stops_counting() {
        let (mut chain, node) = chain_at_100();
        let (tx, a) = claim_tx(chain.coinbase(1), "foo", 10, ALICE);
        node.apply(&chain.block(vec![tx]));
        let (tx, b) = claim_tx(chain.coinbase(2), "foo", 50, BOB);
        node.apply(&chain.block(vec![tx]));
        let support = support_tx(chain.coinbase(3), "foo", &a, 45, CAROL);
        node.apply(&chain.block(vec![support.clone()]));
        assert_eq!(node.controlling("foo"), Some(a));

        node.apply(&chain.block(vec![abandon_tx(
            Outpoint::new(support.txid(), 0),
            45,
            CAROL,
        )]));
        let a_record = node.claim(&a).unwrap();
        assert_eq!(a_record.effective_amount, 10);
        assert_eq!(a_record.support_amount, 0);
        assert_eq!(node.controlling("foo"), Some(b));
        assert_eq!(node.last_take_over("foo"), Some(103));
        node.assert_invariants();
    }

    // =========================================================================
    // ACTIVATION DELAY
    // =========================================================================

    #[test]
    fn test_challenger_waits_for_activation() {
        let (mut chain, node) = chain_at_100();
        let (tx, a) = claim_tx(chain.coinbase(1), "foo", 10, ALICE);
        node.apply(&chain.block(vec![tx]));
        for _ in 101..164 {
            node.apply(&chain.block(vec![]));
        }

        // 64 blocks after the takeover: two blocks of delay.
        let (tx, b) = claim_tx(chain.coinbase(2), "foo", 50, BOB);
        let touched = node.apply(&chain.block(vec![tx]));
        assert_eq!(touched.height, 164);
        assert_eq!(node.claim(&b).unwrap().activation_height, Some(166));
        assert_eq!(node.controlling("foo"), Some(a));
        node.assert_invariants();

        node.apply(&chain.block(vec![]));
        assert_eq!(node.controlling("foo"), Some(a));

        let touched = node.apply(&chain.block(vec![]));
        assert_eq!(touched.height, 166);
        assert_eq!(node.controlling("foo"), Some(b));
        assert_eq!(node.last_take_over("foo"), Some(166));
        node.assert_invariants();
    }

    #[test]
    fn test_names_are_independent() {
        let (mut chain, node) = chain_at_100();
        let (foo, a) = claim_tx(chain.coinbase(1), "foo", 10, ALICE);
        let (bar, b) = claim_tx(chain.coinbase(2), "bar", 5, BOB);
        let touched = node.apply(&chain.block(vec![foo, bar]));

        assert_eq!(touched.takeovers.len(), 2);
        assert_eq!(node.controlling("foo"), Some(a));
        assert_eq!(node.controlling("bar"), Some(b));
        assert_eq!(node.utxo_total(), minted(&node) - 2 * FEE);
        node.assert_invariants();
    }
}
