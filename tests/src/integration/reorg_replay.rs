//! # Reorg and Replay
//!
//! Two properties of the block processor:
//!
//! - **Replay determinism**: the same blocks give byte-identical stores.
//! - **Exact rewind**: rewinding blocks leaves the store as if they were
//!   never applied, so a reorganised node equals one that only ever saw
//!   the winning branch.
//!
//! Both are checked directly against the processor and through the sync
//! service following a daemon that switches branches.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use hub_02_storage::RawReader;
    use hub_04_block_processor::{SyncConfig, SyncService};
    use shared_bus::{EventFilter, EventPublisher, HubEvent, InMemoryEventBus, Subscription};
    use shared_types::Height;
    use tokio::sync::watch;
    use tokio::time::timeout;

    use crate::integration::chain::{
        claim_tx, daemon_for, extend_random, support_tx, ChainBuilder, Node, ALICE, BOB, CAROL,
        COINBASE_VALUE, FEE,
    };

    // =========================================================================
    // REPLAY DETERMINISM
    // =========================================================================

    #[test]
    fn test_replay_is_byte_identical() {
        for seed in [1, 7, 42] {
            let mut chain = ChainBuilder::with_empty_blocks(20);
            extend_random(&mut chain, seed, 40, 1);

            let first = Node::synced_to(&chain, 200);
            let second = Node::synced_to(&chain, 200);
            assert_eq!(
                first.db().scan_raw(&[]).unwrap(),
                second.db().scan_raw(&[]).unwrap(),
                "seed {seed}"
            );
        }
    }

    #[test]
    fn test_random_workload_keeps_invariants_and_value() {
        for seed in [3, 11] {
            let mut chain = ChainBuilder::with_empty_blocks(20);
            let txs = extend_random(&mut chain, seed, 60, 1);

            let node = Node::new(200);
            for block in chain.blocks() {
                node.apply(block);
                node.assert_invariants();
            }
            let minted = COINBASE_VALUE * u64::from(chain.next_height());
            assert_eq!(node.utxo_total(), minted - FEE * txs as u64, "seed {seed}");
        }
    }

    // =========================================================================
    // REWIND
    // =========================================================================

    /// Heights 100..=102 carry a claim, a challenger and a support.
    fn claim_branch(base: &ChainBuilder) -> ChainBuilder {
        let mut chain = base.clone();
        let (tx, a) = claim_tx(chain.coinbase(1), "foo", 10, ALICE);
        chain.block(vec![tx]);
        let (tx, _) = claim_tx(chain.coinbase(2), "foo", 50, BOB);
        chain.block(vec![tx]);
        chain.block(vec![support_tx(chain.coinbase(3), "foo", &a, 45, CAROL)]);
        chain
    }

    #[test]
    fn test_rewind_erases_replaced_blocks() {
        let base = ChainBuilder::with_empty_blocks(100);
        let node = Node::synced_to(&base, 200);
        let before = node.state_rows();

        let main = claim_branch(&base);
        node.apply_all(main.blocks_from(100));
        assert!(node.controlling("foo").is_some());

        let summary = node.processor.rewind(99).unwrap();
        assert_eq!(summary.blocks_removed(), 3);
        assert_eq!(node.state_rows(), before);
        assert_eq!(node.controlling("foo"), None);
        assert_eq!(node.processor.tip().unwrap(), Some(base.tip()));
        assert_eq!(node.processor.headers().count(), 100);
        node.assert_invariants();

        // The replacement branch: B alone, then C outbids it at 102.
        let mut fork = base.fork_at(100, 1);
        let (tx, b) = claim_tx(fork.coinbase(2), "foo", 50, BOB);
        fork.block(vec![tx]);
        fork.empty_blocks(1);
        let (tx, c) = claim_tx(fork.coinbase(4), "foo", 80, CAROL);
        fork.block(vec![tx]);
        fork.empty_blocks(1);
        node.apply_all(fork.blocks_from(100));

        let fresh = Node::synced_to(&fork, 200);
        assert_eq!(node.state_rows(), fresh.state_rows());
        assert_eq!(node.controlling("foo"), Some(c));
        assert!(node.claim(&b).is_some());
        assert_eq!(node.last_take_over("foo"), Some(102));
        node.assert_invariants();
    }

    #[test]
    fn test_rewind_of_random_branch_matches_fresh_node() {
        let base = ChainBuilder::with_empty_blocks(20);
        let mut main = base.clone();
        extend_random(&mut main, 5, 30, 1);
        let mut fork = base.fork_at(20, 1);
        extend_random(&mut fork, 6, 35, 1);

        let node = Node::synced_to(&main, 200);
        node.processor.rewind(19).unwrap();
        assert_eq!(node.state_rows(), Node::synced_to(&base, 200).state_rows());

        node.apply_all(fork.blocks_from(20));
        assert_eq!(node.state_rows(), Node::synced_to(&fork, 200).state_rows());
        node.assert_invariants();
    }

    // =========================================================================
    // REORG THROUGH THE SYNC SERVICE
    // =========================================================================

    async fn next_event(sub: &mut Subscription) -> HubEvent {
        timeout(Duration::from_secs(10), sub.recv())
            .await
            .expect("event timed out")
            .expect("bus closed")
    }

    async fn wait_caught_up(sub: &mut Subscription, height: Height) -> Option<(Height, Height)> {
        let mut rewound = None;
        loop {
            match next_event(sub).await {
                HubEvent::ChainRewound {
                    from_height,
                    to_height,
                    ..
                } => rewound = Some((from_height, to_height)),
                HubEvent::CaughtUp { height: h } if h == height => return rewound,
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_sync_follows_daemon_to_longer_branch() {
        let base = ChainBuilder::with_empty_blocks(20);
        let mut main = base.clone();
        extend_random(&mut main, 21, 30, 1);
        let mut fork = base.fork_at(20, 1);
        extend_random(&mut fork, 22, 35, 1);

        let node = Node::new(200);
        let daemon = daemon_for(&main);
        let bus = Arc::new(InMemoryEventBus::new());
        let config = SyncConfig {
            batch_size: 10,
            polling_interval: Duration::from_millis(5),
            retry_delay: Duration::from_millis(5),
            ..Default::default()
        };
        let sync = Arc::new(SyncService::new(
            node.processor.clone(),
            daemon.clone(),
            bus.clone() as Arc<dyn EventPublisher>,
            config,
        ));
        let mut sub = bus.subscribe(EventFilter::all());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.run(shutdown_rx).await })
        };

        assert_eq!(wait_caught_up(&mut sub, 49).await, None);
        assert_eq!(node.state_rows(), Node::synced_to(&main, 200).state_rows());

        daemon.reorganize(20, fork.blocks_from(20));
        assert_eq!(wait_caught_up(&mut sub, 54).await, Some((49, 19)));
        assert_eq!(node.processor.tip().unwrap(), Some(fork.tip()));
        assert_eq!(node.state_rows(), Node::synced_to(&fork, 200).state_rows());
        node.assert_invariants();

        shutdown_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }
}
