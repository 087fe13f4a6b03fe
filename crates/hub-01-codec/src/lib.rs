//! # Binary Codec (hub-01)
//!
//! Encodes and decodes everything the hub reads off the wire: 112-byte block
//! headers, blocks, transactions (with optional witness data), output and
//! input scripts, and claim value envelopes. Pure and stateless.
//!
//! ## Script templates
//!
//! Scripts are matched against a closed, ordered list of templates:
//!
//! | Template | Shape |
//! |----------|-------|
//! | `pay_pubkey_full` | `<pubkey> OP_CHECKSIG` |
//! | `pay_pubkey_hash` | `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG` |
//! | `pay_script_hash` | `OP_HASH160 <hash> OP_EQUAL` |
//! | `return_data` | `OP_RETURN <data>` |
//! | `claim_name+...` | `OP_CLAIM_NAME <name> <value> OP_2DROP OP_DROP <payment>` |
//! | `support_claim+...` | `OP_SUPPORT_CLAIM <name> <claim_id> OP_2DROP OP_DROP <payment>` |
//! | `update_claim+...` | `OP_UPDATE_CLAIM <name> <claim_id> <value> OP_2DROP OP_2DROP <payment>` |
//!
//! A script that matches nothing is an error value. Block processing treats
//! such outputs as unknown and carries on.
//!
//! ## Crate Structure
//!
//! - `domain/` - wire structures and script parsing
//! - `ports/` - [`BinaryCodecApi`]
//! - `service.rs` - [`BinaryCodec`]
//! - `test_utils.rs` - fixture builders (`test-utils` feature)

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use domain::block::Block;
pub use domain::claim::{ClaimKind, ClaimValue};
pub use domain::errors::{CodecError, ScriptError};
pub use domain::header::{header_hash, header_prev_hash, BlockHeader};
pub use domain::merkle::{merkle_branch, merkle_root, root_from_branch};
pub use domain::script::{
    output_hashx, ClaimOperation, InputScript, OutputScript, PaymentDestination, TemplateKind,
};
pub use domain::transaction::{Transaction, TxInput, TxOutput};
pub use ports::inbound::BinaryCodecApi;
pub use service::BinaryCodec;
