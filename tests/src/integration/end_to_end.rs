//! # End to End
//!
//! A wallet's view of the whole hub: configuration from a file, sync from
//! a scripted daemon, and newline-delimited JSON-RPC over TCP.

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::net::SocketAddr;
    use std::time::Duration;

    use hub_01_codec::test_utils::{p2pkh_script, TxBuilder};
    use hub_06_query_executor::{OutputRow, Outputs, ResolveErrorKind};
    use node_runtime::HubConfig;
    use serde_json::{json, Value};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    use crate::integration::chain::{
        claim_tx, daemon_for, hub_config, start_hub, wait_for_height, ChainBuilder, ALICE, BOB,
        COINBASE_VALUE, FEE,
    };

    // =========================================================================
    // CLIENT
    // =========================================================================

    struct Client {
        lines: Lines<BufReader<OwnedReadHalf>>,
        write: OwnedWriteHalf,
        next_id: u64,
        /// Notifications read while waiting for a reply.
        pending: VecDeque<Value>,
    }

    impl Client {
        async fn connect(addr: SocketAddr) -> Self {
            let (read, write) = TcpStream::connect(addr).await.unwrap().into_split();
            Self {
                lines: BufReader::new(read).lines(),
                write,
                next_id: 0,
                pending: VecDeque::new(),
            }
        }

        async fn read(&mut self) -> Value {
            let line = timeout(Duration::from_secs(10), self.lines.next_line())
                .await
                .expect("hub went quiet")
                .unwrap()
                .expect("connection closed");
            serde_json::from_str(&line).unwrap()
        }

        async fn call(&mut self, method: &str, params: Value) -> Value {
            self.next_id += 1;
            let request = json!({"id": self.next_id, "method": method, "params": params});
            self.write
                .write_all(format!("{request}\n").as_bytes())
                .await
                .unwrap();
            loop {
                let message = self.read().await;
                if message["id"] == json!(self.next_id) {
                    assert!(message.get("error").is_none(), "{method} failed: {message}");
                    return message["result"].clone();
                }
                self.pending.push_back(message);
            }
        }

        /// Next notification of `method` whose params satisfy `accept`.
        async fn notification(&mut self, method: &str, accept: impl Fn(&Value) -> bool) -> Value {
            loop {
                let message = match self.pending.pop_front() {
                    Some(message) => message,
                    None => self.read().await,
                };
                if message["method"] == method && accept(&message["params"]) {
                    return message["params"].clone();
                }
            }
        }
    }

    fn scripthash(script: &[u8]) -> String {
        let mut hash = shared_types::sha256(script);
        hash.reverse();
        hex::encode(hash)
    }

    fn resolved(result: &Value) -> Outputs {
        Outputs::from_base64(result.as_str().unwrap()).unwrap()
    }

    // =========================================================================
    // SCENARIOS
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_wallet_session_over_tcp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        std::fs::write(
            &path,
            r#"
            [network]
            net = "regtest"

            [daemon]
            url = "memory"
            polling_interval_ms = 10

            [session]
            host = "127.0.0.1"
            tcp_port = 0

            [mempool]
            refresh_interval_ms = 50
            "#,
        )
        .unwrap();
        let config = HubConfig::from_file(&path).unwrap();
        config.validate().unwrap();

        let mut chain = ChainBuilder::with_empty_blocks(10);
        let (a, _) = claim_tx(chain.coinbase(1), "foo", 30, ALICE);
        let (b, _) = claim_tx(chain.coinbase(2), "foo", 60, BOB);
        chain.block(vec![a, b]);
        let daemon = daemon_for(&chain);
        let runtime = start_hub(daemon.clone(), &config).await;
        wait_for_height(&runtime, 10).await;

        let mut client = Client::connect(runtime.local_addr().unwrap()).await;
        let version = client.call("server.version", json!(["e2e-wallet", "1.4"])).await;
        assert_eq!(version[1], "1.4");
        let tip = client.call("blockchain.headers.subscribe", json!([])).await;
        assert_eq!(tip["block_height"], 10);

        // The larger claim controls the name.
        let outputs = resolved(
            &client
                .call("blockchain.claimtrie.resolve", json!(["lbry://foo", "lbry://nothing"]))
                .await,
        );
        let winner = outputs.txos[0].claim().unwrap();
        assert_eq!(winner.name, "foo");
        assert_eq!(winner.amount, 60);
        assert!(winner.is_controlling);
        assert!(matches!(
            outputs.txos[1],
            OutputRow::Error {
                kind: ResolveErrorKind::NotFound,
                ..
            }
        ));

        // Subscribe to ALICE, then pay her from the mempool.
        let alice_script = p2pkh_script(ALICE);
        let alias = scripthash(&alice_script);
        let status = client
            .call("blockchain.scripthash.subscribe", json!([alias]))
            .await;
        assert!(status.is_string());

        let payment = TxBuilder::new()
            .spend(chain.coinbase(5))
            .pay(COINBASE_VALUE - FEE, alice_script.clone())
            .build();
        daemon.add_mempool_tx(&payment);
        let note = client
            .notification("blockchain.scripthash.subscribe", |params| params[0] == alias)
            .await;
        assert_ne!(note[1], status);
        let balance = client
            .call("blockchain.scripthash.get_balance", json!([alias]))
            .await;
        let claim_change = COINBASE_VALUE - 30 - FEE;
        assert_eq!(
            balance,
            json!({"confirmed": claim_change + 30, "unconfirmed": COINBASE_VALUE - FEE})
        );

        // Confirm it.
        daemon.clear_mempool();
        daemon.push_block(&chain.block(vec![payment]));
        let header = client
            .notification("blockchain.headers.subscribe", |params| params[0]["block_height"] == 11)
            .await;
        assert_eq!(header[0]["block_height"], 11);
        let balance = client
            .call("blockchain.scripthash.get_balance", json!([alias]))
            .await;
        assert_eq!(
            balance,
            json!({"confirmed": claim_change + 30 + COINBASE_VALUE - FEE, "unconfirmed": 0})
        );

        runtime.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reorg_reaches_sessions() {
        let mut chain = ChainBuilder::with_empty_blocks(11);
        let (tx, _) = claim_tx(chain.coinbase(1), "foo", 30, ALICE);
        chain.block(vec![tx]);
        let daemon = daemon_for(&chain);
        let runtime = start_hub(daemon.clone(), &hub_config()).await;
        wait_for_height(&runtime, 11).await;

        let mut client = Client::connect(runtime.local_addr().unwrap()).await;
        client.call("blockchain.headers.subscribe", json!([])).await;
        let before = resolved(&client.call("blockchain.claimtrie.resolve", json!(["lbry://foo"])).await);
        assert!(before.txos[0].claim().is_some());

        // A longer branch without the claim replaces height 11.
        let mut fork = chain.fork_at(11, 1);
        fork.empty_blocks(3);
        daemon.reorganize(11, fork.blocks_from(11));
        client
            .notification("blockchain.headers.subscribe", |params| params[0]["block_height"] == 13)
            .await;

        let after = resolved(&client.call("blockchain.claimtrie.resolve", json!(["lbry://foo"])).await);
        assert!(matches!(
            after.txos[0],
            OutputRow::Error {
                kind: ResolveErrorKind::NotFound,
                ..
            }
        ));
        assert_eq!(
            runtime.subsystems().processor.tip().unwrap(),
            Some(fork.tip())
        );

        runtime.shutdown().await;
    }
}
