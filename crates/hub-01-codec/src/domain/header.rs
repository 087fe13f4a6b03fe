//! # Block Headers
//!
//! Fixed 112-byte layout:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | version |
//! | 4 | 32 | previous block hash |
//! | 36 | 32 | merkle root |
//! | 68 | 32 | claim-trie root |
//! | 100 | 4 | timestamp |
//! | 104 | 4 | bits |
//! | 108 | 4 | nonce |

use serde::{Deserialize, Serialize};
use shared_types::{double_sha256, BlockHash, Hash, HEADER_SIZE};

use super::errors::CodecError;
use super::primitives::{ByteReader, ByteWriter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block_hash: BlockHash,
    pub merkle_root: Hash,
    pub claim_trie_root: Hash,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            version: reader.read_i32()?,
            prev_block_hash: reader.read_array()?,
            merkle_root: reader.read_array()?,
            claim_trie_root: reader.read_array()?,
            timestamp: reader.read_u32()?,
            bits: reader.read_u32()?,
            nonce: reader.read_u32()?,
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() != HEADER_SIZE {
            return Err(CodecError::InvalidHeaderLength {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        Self::read_from(&mut ByteReader::new(bytes))
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut writer = ByteWriter::with_capacity(HEADER_SIZE);
        writer.write_i32(self.version);
        writer.write_bytes(&self.prev_block_hash);
        writer.write_bytes(&self.merkle_root);
        writer.write_bytes(&self.claim_trie_root);
        writer.write_u32(self.timestamp);
        writer.write_u32(self.bits);
        writer.write_u32(self.nonce);
        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(&writer.into_bytes());
        out
    }

    pub fn hash(&self) -> BlockHash {
        double_sha256(&self.encode())
    }
}

/// Hash of a raw header without decoding it.
pub fn header_hash(raw: &[u8]) -> BlockHash {
    double_sha256(raw)
}

/// Previous-block hash of a raw header.
pub fn header_prev_hash(raw: &[u8]) -> Result<BlockHash, CodecError> {
    let mut reader = ByteReader::new(raw);
    reader.read_bytes(4)?;
    reader.read_array()
}
