//! # Codec Service
//!
//! [`BinaryCodec`] is the zero-sized implementation of [`BinaryCodecApi`].

use shared_types::HashX;
use tracing::trace;

use crate::domain::block::Block;
use crate::domain::claim::ClaimValue;
use crate::domain::errors::CodecError;
use crate::domain::header::BlockHeader;
use crate::domain::script::{self, OutputScript};
use crate::domain::transaction::Transaction;
use crate::ports::inbound::BinaryCodecApi;

#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl BinaryCodec {
    pub fn new() -> Self {
        Self
    }
}

impl BinaryCodecApi for BinaryCodec {
    fn decode_block(&self, raw: &[u8]) -> Result<(BlockHeader, Vec<Transaction>), CodecError> {
        let block = Block::decode(raw)?;
        trace!(txs = block.transactions.len(), bytes = raw.len(), "Decoded block");
        Ok((block.header, block.transactions))
    }

    fn decode_transaction(&self, raw: &[u8]) -> Result<Transaction, CodecError> {
        Transaction::decode(raw)
    }

    fn encode_transaction(&self, tx: &Transaction) -> Vec<u8> {
        tx.encode()
    }

    fn decode_header(&self, raw: &[u8]) -> Result<BlockHeader, CodecError> {
        BlockHeader::decode(raw)
    }

    fn classify_output(&self, script: &[u8]) -> Result<OutputScript, CodecError> {
        Ok(OutputScript::parse(script)?)
    }

    fn output_hashx(&self, script: &[u8]) -> Option<HashX> {
        script::output_hashx(script)
    }

    fn decode_claim_value(&self, raw: &[u8]) -> Result<ClaimValue, CodecError> {
        ClaimValue::decode(raw)
    }
}
