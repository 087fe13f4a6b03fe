//! Deterministic chains and a node that applies them.
//!
//! [`ChainBuilder`] produces blocks without indexing them, so the same
//! blocks can be fed to several nodes, or to a [`MemoryDaemon`] for the
//! sync service. Identical builder calls give byte-identical blocks.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use hub_01_codec::test_utils::{
    claim_script, coinbase_tx, p2pkh_script, stream_value, support_script, BlockBuilder, TxBuilder,
};
use hub_01_codec::{Block, Transaction};
use hub_02_storage::{
    ClaimRecord, ClaimTrieReader, HubDb, HubStorage, KeyPrefix, MemoryHeaderStore, RawReader,
    UtxoReader,
};
use hub_03_claimtrie::{check_invariants, ClaimTrieEngine};
use hub_04_block_processor::{BlockProcessor, MemoryDaemon, TouchedSet};
use node_runtime::{HubConfig, HubRuntime, HubSubsystems};
use shared_types::{
    hashx_from_payment_script, BlockHash, ClaimHash, Height, Network, Outpoint, ZERO_HASH,
};

/// Coinbase reward of every block.
pub const COINBASE_VALUE: u64 = 1_000;
/// Fee left by every transaction the helpers build.
pub const FEE: u64 = 10;

pub const MINER: [u8; 20] = [0x01; 20];
pub const ALICE: [u8; 20] = [0xA1; 20];
pub const BOB: [u8; 20] = [0xB0; 20];
pub const CAROL: [u8; 20] = [0xC0; 20];

/// Every payment key the helpers use.
pub const OWNERS: [[u8; 20]; 4] = [MINER, ALICE, BOB, CAROL];

#[derive(Debug, Clone)]
pub struct ChainBuilder {
    blocks: Vec<Block>,
    nonce: u32,
}

impl Default for ChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            nonce: 0,
        }
    }

    /// `count` empty blocks from genesis.
    pub fn with_empty_blocks(count: u32) -> Self {
        let mut chain = Self::new();
        chain.empty_blocks(count);
        chain
    }

    /// A competing branch sharing blocks below `height`. Blocks built on
    /// it differ from this chain's through `nonce`.
    pub fn fork_at(&self, height: Height, nonce: u32) -> Self {
        Self {
            blocks: self.blocks[..height as usize].to_vec(),
            nonce,
        }
    }

    pub fn next_height(&self) -> Height {
        self.blocks.len() as Height
    }

    pub fn tip(&self) -> BlockHash {
        self.blocks
            .last()
            .map_or(ZERO_HASH, |block| block.header.hash())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Blocks from `height` up.
    pub fn blocks_from(&self, height: Height) -> &[Block] {
        &self.blocks[height as usize..]
    }

    /// Append a block paying the coinbase to [`MINER`].
    pub fn block(&mut self, txs: Vec<Transaction>) -> Block {
        let height = self.next_height();
        let block = BlockBuilder::new(self.tip())
            .with_transaction(coinbase_tx(height, COINBASE_VALUE, p2pkh_script(MINER)))
            .with_transactions(txs)
            .nonce(self.nonce)
            .build();
        self.blocks.push(block.clone());
        block
    }

    pub fn empty_blocks(&mut self, count: u32) {
        for _ in 0..count {
            self.block(vec![]);
        }
    }

    /// Coinbase output of the block at `height`.
    pub fn coinbase(&self, height: Height) -> Outpoint {
        Outpoint::new(self.blocks[height as usize].transactions[0].txid(), 0)
    }
}

/// Claim `name` for `amount` out of a coinbase. Change goes to `owner`.
pub fn claim_tx(funding: Outpoint, name: &str, amount: u64, owner: [u8; 20]) -> (Transaction, ClaimHash) {
    let tx = TxBuilder::new()
        .spend(funding)
        .pay(amount, claim_script(name, &stream_value(name), owner))
        .pay(COINBASE_VALUE - amount - FEE, p2pkh_script(owner))
        .build();
    let claim_hash = ClaimHash::from_outpoint(&Outpoint::new(tx.txid(), 0));
    (tx, claim_hash)
}

/// Support `claim_hash` for `amount` out of a coinbase.
pub fn support_tx(
    funding: Outpoint,
    name: &str,
    claim_hash: &ClaimHash,
    amount: u64,
    owner: [u8; 20],
) -> Transaction {
    TxBuilder::new()
        .spend(funding)
        .pay(amount, support_script(name, claim_hash, owner))
        .pay(COINBASE_VALUE - amount - FEE, p2pkh_script(owner))
        .build()
}

/// Spend a claim output of `amount` back to a plain payment.
pub fn abandon_tx(claim_output: Outpoint, amount: u64, owner: [u8; 20]) -> Transaction {
    TxBuilder::new()
        .spend(claim_output)
        .pay(amount - FEE, p2pkh_script(owner))
        .build()
}

/// Names the random workload competes for.
pub const NAMES: [&str; 4] = ["foo", "bar", "baz", "qux"];

/// Append `blocks` blocks of random claims, supports and abandons, funded
/// from coinbases at `first_coinbase` upward. The same seed gives the same
/// blocks. Returns how many non-coinbase transactions were added.
pub fn extend_random(chain: &mut ChainBuilder, seed: u64, blocks: u32, first_coinbase: Height) -> usize {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut next_coinbase = first_coinbase;
    // Claim outputs confirmed in earlier blocks: (outpoint, amount, owner, hash, name).
    let mut live: Vec<(Outpoint, u64, [u8; 20], ClaimHash, &'static str)> = Vec::new();
    let mut added = 0;

    for _ in 0..blocks {
        let mut txs = Vec::new();
        let mut created = Vec::new();
        for _ in 0..rng.gen_range(0..4) {
            let owner = OWNERS[rng.gen_range(1..OWNERS.len())];
            let action = rng.gen_range(0..10);
            let funded = next_coinbase < chain.next_height();
            if action < 5 && funded {
                let name = NAMES[rng.gen_range(0..NAMES.len())];
                let amount = rng.gen_range(FEE + 1..500);
                let (tx, claim_hash) = claim_tx(chain.coinbase(next_coinbase), name, amount, owner);
                next_coinbase += 1;
                created.push((Outpoint::new(tx.txid(), 0), amount, owner, claim_hash, name));
                txs.push(tx);
            } else if action < 8 && funded && !live.is_empty() {
                let (_, _, _, claim_hash, name) = live[rng.gen_range(0..live.len())];
                let amount = rng.gen_range(1..500);
                txs.push(support_tx(chain.coinbase(next_coinbase), name, &claim_hash, amount, owner));
                next_coinbase += 1;
            } else if action >= 8 && !live.is_empty() {
                let (outpoint, amount, owner, _, _) = live.swap_remove(rng.gen_range(0..live.len()));
                txs.push(abandon_tx(outpoint, amount, owner));
            }
        }
        added += txs.len();
        chain.block(txs);
        live.extend(created);
    }
    added
}

/// A block processor over in-memory storage.
pub struct Node {
    pub processor: Arc<BlockProcessor>,
}

impl Node {
    pub fn new(reorg_limit: u32) -> Self {
        Self {
            processor: Arc::new(BlockProcessor::new(
                Arc::new(HubDb::in_memory(reorg_limit)),
                Arc::new(MemoryHeaderStore::new()),
                ClaimTrieEngine::default(),
            )),
        }
    }

    /// A node that has already applied every block of `chain`.
    pub fn synced_to(chain: &ChainBuilder, reorg_limit: u32) -> Self {
        let node = Self::new(reorg_limit);
        node.apply_all(chain.blocks());
        node
    }

    pub fn db(&self) -> &Arc<HubDb> {
        self.processor.db()
    }

    pub fn apply(&self, block: &Block) -> TouchedSet {
        self.processor
            .advance_block(&block.encode())
            .expect("block applies")
    }

    pub fn apply_all(&self, blocks: &[Block]) {
        for block in blocks {
            self.apply(block);
        }
    }

    pub fn height(&self) -> Height {
        self.processor
            .height()
            .expect("chain state readable")
            .expect("at least genesis")
    }

    pub fn controlling(&self, name: &str) -> Option<ClaimHash> {
        self.db()
            .get_trie_entry(name)
            .expect("trie readable")
            .map(|entry| entry.claim_hash)
    }

    pub fn last_take_over(&self, name: &str) -> Option<Height> {
        self.db()
            .get_trie_entry(name)
            .expect("trie readable")
            .map(|entry| entry.last_take_over_height)
    }

    pub fn claim(&self, claim_hash: &ClaimHash) -> Option<ClaimRecord> {
        self.db().get_claim(claim_hash).expect("claims readable")
    }

    /// Every row except undo records, which hold history rather than state.
    pub fn state_rows(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut rows = self.db().scan_raw(&[]).expect("store scannable");
        rows.retain(|(key, _)| key[0] != KeyPrefix::Undo.byte());
        rows
    }

    /// Confirmed value held by the helper keys.
    pub fn utxo_total(&self) -> u64 {
        OWNERS
            .iter()
            .map(|owner| {
                let hashx = hashx_from_payment_script(&p2pkh_script(*owner));
                self.db().get_balance(&hashx).expect("balances readable")
            })
            .sum()
    }

    pub fn assert_invariants(&self) {
        let violations = check_invariants(&**self.db(), self.height()).expect("trie readable");
        assert!(violations.is_empty(), "invariant violations: {violations:?}");
    }
}

/// Serve every block of `chain` from a scripted daemon.
pub fn daemon_for(chain: &ChainBuilder) -> Arc<MemoryDaemon> {
    let daemon = Arc::new(MemoryDaemon::new());
    for block in chain.blocks() {
        daemon.push_block(block);
    }
    daemon
}

/// Regtest hub on an ephemeral port with fast polling.
pub fn hub_config() -> HubConfig {
    let mut config = HubConfig::default();
    config.network.net = Network::Regtest;
    config.daemon.url = "memory".into();
    config.daemon.polling_interval_ms = 10;
    config.daemon.batch_size = 25;
    config.mempool.refresh_interval_ms = 50;
    config.session.host = "127.0.0.1".into();
    config.session.tcp_port = 0;
    config
}

/// Assemble and start a hub over in-memory storage.
pub async fn start_hub(daemon: Arc<MemoryDaemon>, config: &HubConfig) -> HubRuntime {
    let subsystems = HubSubsystems::assemble(config, HubStorage::in_memory(200), daemon)
        .expect("hub assembles");
    let mut runtime = HubRuntime::new(subsystems);
    runtime.start().await.expect("hub starts");
    runtime
}

pub async fn wait_for_height(runtime: &HubRuntime, height: Height) {
    for _ in 0..500 {
        if runtime.subsystems().processor.height().expect("chain state readable") == Some(height) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("hub never reached height {height}");
}
