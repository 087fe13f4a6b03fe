//! # Outbound Ports
//!
//! The engine runs against any claim-table writer, in practice the block
//! transaction from `hub-02-storage`, so its writes land in the same atomic
//! commit as the block's UTXO changes.

use hub_02_storage::ClaimTrieWriter;

/// Claim rows, supports and trie entries with staged writes.
pub trait ClaimStore: ClaimTrieWriter {}

impl<T: ClaimTrieWriter + ?Sized> ClaimStore for T {}
