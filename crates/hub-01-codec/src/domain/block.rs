//! # Blocks
//!
//! A header followed by a compact-size transaction count and the
//! transactions in block order.

use shared_types::TxHash;

use super::errors::CodecError;
use super::header::BlockHeader;
use super::primitives::{ByteReader, ByteWriter};
use super::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = ByteReader::new(bytes);
        let header = BlockHeader::read_from(&mut reader)?;
        let count = reader.read_length()?;
        let mut transactions = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            transactions.push(Transaction::read_from(&mut reader)?);
        }
        reader.finish("block")?;
        Ok(Self {
            header,
            transactions,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_bytes(&self.header.encode());
        writer.write_compact_size(self.transactions.len() as u64);
        for tx in &self.transactions {
            writer.write_bytes(&tx.encode());
        }
        writer.into_bytes()
    }

    pub fn tx_hashes(&self) -> Vec<TxHash> {
        self.transactions.iter().map(Transaction::txid).collect()
    }
}
