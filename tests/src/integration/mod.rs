//! # Integration Scenarios
//!
//! Every scenario drives real blocks through the block processor, the same
//! way the sync service does, and inspects the resulting store.
//!
//! | Module | Covers |
//! |--------|--------|
//! | `claimtrie_scenarios` | takeovers, supports, abandons, the trie invariants |
//! | `reorg_replay` | rewind exactness and replay determinism, direct and via sync |
//! | `query_coalescing` | identical searches share one execution |
//! | `end_to_end` | daemon to session over the assembled runtime |

pub mod chain;

mod claimtrie_scenarios;
mod end_to_end;
mod query_coalescing;
mod reorg_replay;
