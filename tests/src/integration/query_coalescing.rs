//! # Query Coalescing
//!
//! Identical claim searches arriving together, from one caller or from
//! many sessions, run on a worker once. Results are reused within the
//! cache TTL and dropped as soon as a block changes the claim store.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use hub_06_query_executor::{
        MemorySearchIndex, Outputs, QueryApi, QueryConfig, QueryExecutor, SearchIndex,
        SearchIndexer,
    };
    use serde_json::{json, Map, Value};
    use tokio::time::timeout;

    use crate::integration::chain::{
        claim_tx, daemon_for, hub_config, start_hub, wait_for_height, ChainBuilder, Node, ALICE,
        BOB, CAROL,
    };

    // =========================================================================
    // FIXTURES
    // =========================================================================

    /// Two claims on "foo" and one on "bar", heights 0..=11.
    fn claim_chain() -> ChainBuilder {
        let mut chain = ChainBuilder::with_empty_blocks(10);
        let (foo_a, _) = claim_tx(chain.coinbase(1), "foo", 30, ALICE);
        let (bar, _) = claim_tx(chain.coinbase(2), "bar", 20, BOB);
        chain.block(vec![foo_a, bar]);
        let (foo_b, _) = claim_tx(chain.coinbase(3), "foo", 60, BOB);
        chain.block(vec![foo_b]);
        chain
    }

    fn executor(node: &Node, config: QueryConfig) -> Arc<QueryExecutor> {
        let index: Arc<dyn SearchIndex> = Arc::new(MemorySearchIndex::new());
        SearchIndexer::new(node.db().clone(), index.clone())
            .rebuild()
            .unwrap();
        Arc::new(QueryExecutor::new(node.db().clone(), index, config))
    }

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn claim_names(encoded: &str) -> Vec<String> {
        Outputs::from_base64(encoded)
            .unwrap()
            .claims()
            .map(|claim| claim.name.clone())
            .collect()
    }

    // =========================================================================
    // EXECUTOR
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_identical_searches_run_once() {
        let node = Node::synced_to(&claim_chain(), 200);
        let executor = executor(&node, QueryConfig::default());
        let query = params(json!({"name": "foo", "order_by": ["effective_amount"]}));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let executor = executor.clone();
                let query = query.clone();
                tokio::spawn(async move { executor.search(query).await })
            })
            .collect();
        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap().unwrap());
        }

        assert_eq!(executor.executions(), 1);
        assert!(results.iter().all(|result| Arc::ptr_eq(result, &results[0])));
        assert_eq!(claim_names(&results[0]), vec!["foo", "foo"]);
    }

    #[tokio::test]
    async fn test_distinct_searches_run_separately() {
        let node = Node::synced_to(&claim_chain(), 200);
        let executor = executor(&node, QueryConfig::default());

        let (foo, bar) = tokio::join!(
            executor.search(params(json!({"name": "foo"}))),
            executor.search(params(json!({"name": "bar"}))),
        );
        assert_eq!(claim_names(&foo.unwrap()).len(), 2);
        assert_eq!(claim_names(&bar.unwrap()), vec!["bar"]);
        assert_eq!(executor.executions(), 2);

        // Resolve has its own cache.
        executor.resolve(vec!["lbry://foo".into()]).await.unwrap();
        assert_eq!(executor.executions(), 3);
    }

    #[tokio::test]
    async fn test_result_expires_after_ttl() {
        let node = Node::synced_to(&claim_chain(), 200);
        let executor = executor(
            &node,
            QueryConfig {
                cache_ttl: Duration::from_millis(50),
                ..QueryConfig::default()
            },
        );
        let query = params(json!({"is_controlling": true}));

        executor.search(query.clone()).await.unwrap();
        executor.search(query.clone()).await.unwrap();
        assert_eq!(executor.executions(), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        executor.search(query).await.unwrap();
        assert_eq!(executor.executions(), 2);
    }

    // =========================================================================
    // THROUGH SESSIONS
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sessions_share_one_execution_and_see_new_blocks() {
        let mut chain = claim_chain();
        let daemon = daemon_for(&chain);
        let runtime = start_hub(daemon.clone(), &hub_config()).await;
        wait_for_height(&runtime, 11).await;
        // Let the router drain the catch-up events, each of which clears
        // the cache.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let hub = runtime.subsystems();
        let before = hub.query.executions();

        let request = r#"{"id":7,"method":"blockchain.claimtrie.search","params":{"name":"foo"}}"#;
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let sessions = hub.sessions.clone();
                tokio::spawn(async move {
                    let (session, _rx) = sessions.open_session(format!("peer-{i}"));
                    sessions.handle_line(&session, request).await.unwrap()
                })
            })
            .collect();
        let mut replies = Vec::new();
        for task in tasks {
            let reply: Value = serde_json::from_str(&task.await.unwrap()).unwrap();
            replies.push(reply);
        }
        assert!(replies.iter().all(|reply| reply == &replies[0]));
        assert_eq!(claim_names(replies[0]["result"].as_str().unwrap()).len(), 2);
        assert_eq!(hub.query.executions() - before, 1);

        // A third "foo" claim: the next identical search must not be served
        // from the cache.
        let (tx, _) = claim_tx(chain.coinbase(4), "foo", 5, CAROL);
        daemon.push_block(&chain.block(vec![tx]));
        wait_for_height(&runtime, 12).await;

        let (session, _rx) = hub.sessions.open_session("late".into());
        let seen = timeout(Duration::from_secs(5), async {
            loop {
                let line = hub.sessions.handle_line(&session, request).await.unwrap();
                let reply: Value = serde_json::from_str(&line).unwrap();
                let names = claim_names(reply["result"].as_str().unwrap());
                if names.len() == 3 {
                    return names;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(seen, vec!["foo", "foo", "foo"]);

        runtime.shutdown().await;
    }
}
