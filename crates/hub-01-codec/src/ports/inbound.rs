//! # Inbound Port
//!
//! What the block processor, mempool and session layer ask of the codec.

use shared_types::HashX;

use crate::domain::claim::ClaimValue;
use crate::domain::errors::CodecError;
use crate::domain::header::BlockHeader;
use crate::domain::script::OutputScript;
use crate::domain::transaction::Transaction;

/// Stateless wire-format API.
pub trait BinaryCodecApi: Send + Sync {
    /// Header and ordered transactions of a raw block.
    fn decode_block(&self, raw: &[u8]) -> Result<(BlockHeader, Vec<Transaction>), CodecError>;

    fn decode_transaction(&self, raw: &[u8]) -> Result<Transaction, CodecError>;

    fn encode_transaction(&self, tx: &Transaction) -> Vec<u8>;

    fn decode_header(&self, raw: &[u8]) -> Result<BlockHeader, CodecError>;

    /// Classify an output script. Errors mean "unknown output".
    fn classify_output(&self, script: &[u8]) -> Result<OutputScript, CodecError>;

    /// Index key of an output script, if it has one.
    fn output_hashx(&self, script: &[u8]) -> Option<HashX>;

    fn decode_claim_value(&self, raw: &[u8]) -> Result<ClaimValue, CodecError>;
}
