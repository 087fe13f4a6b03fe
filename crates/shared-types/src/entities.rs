//! # Core Domain Entities
//!
//! Identifiers shared by every subsystem.
//!
//! ## Clusters
//!
//! - **Chain**: [`Hash`], [`TxHash`], [`BlockHash`], [`Height`], [`Outpoint`]
//! - **Addresses**: [`HashX`], the truncated script fingerprint used as the
//!   subscription and indexing key
//! - **Claims**: [`ClaimHash`] and name normalization

use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::errors::IdentifierError;
use crate::hashing::hash160;

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// A 32-byte hash in internal byte order.
pub type Hash = [u8; 32];

/// Transaction id (double SHA-256 of the non-witness serialization).
pub type TxHash = Hash;

/// Block id (double SHA-256 of the 112-byte header).
pub type BlockHash = Hash;

/// Block height. Genesis is height 0.
pub type Height = u32;

/// The all-zero hash, used as the coinbase prevout and the genesis parent.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Parse a display-order (reversed) hex string into an internal-order hash.
pub fn hex_str_to_hash(value: &str) -> Result<Hash, IdentifierError> {
    let mut bytes = hex::decode(value).map_err(|e| IdentifierError::InvalidHex(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(IdentifierError::WrongLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    bytes.reverse();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    Ok(hash)
}

/// A reference to a specific output of a specific transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Outpoint {
    /// Transaction containing the output.
    pub tx_hash: TxHash,
    /// Output index within the transaction.
    pub nout: u32,
}

impl Outpoint {
    /// Serialized length: 32-byte hash plus 4-byte index.
    pub const LEN: usize = 36;

    pub fn new(tx_hash: TxHash, nout: u32) -> Self {
        Self { tx_hash, nout }
    }

    /// `tx_hash || nout_le32`, the form hashed into claim ids.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[..32].copy_from_slice(&self.tx_hash);
        out[32..].copy_from_slice(&self.nout.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::LEN {
            return None;
        }
        let mut tx_hash = [0u8; 32];
        tx_hash.copy_from_slice(&bytes[..32]);
        let nout = u32::from_le_bytes([bytes[32], bytes[33], bytes[34], bytes[35]]);
        Some(Self { tx_hash, nout })
    }

    /// True for the null prevout carried by coinbase inputs.
    pub fn is_null(&self) -> bool {
        self.tx_hash == ZERO_HASH && self.nout == u32::MAX
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", crate::hashing::hash_to_hex_str(&self.tx_hash), self.nout)
    }
}

// =============================================================================
// CLUSTER B: ADDRESSES
// =============================================================================

/// Length of a [`HashX`].
pub const HASHX_LEN: usize = 11;

/// Truncated SHA-256 of an output's payment script.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct HashX(pub [u8; HASHX_LEN]);

impl HashX {
    /// A client script hash is the display-order hex of `sha256(script)`;
    /// the hashX is the first 11 bytes of the internal-order digest.
    pub fn from_scripthash_hex(scripthash: &str) -> Result<Self, IdentifierError> {
        let hash = hex_str_to_hash(scripthash)?;
        let mut out = [0u8; HASHX_LEN];
        out.copy_from_slice(&hash[..HASHX_LEN]);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != HASHX_LEN {
            return None;
        }
        let mut out = [0u8; HASHX_LEN];
        out.copy_from_slice(bytes);
        Some(Self(out))
    }
}

impl fmt::Debug for HashX {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashX({})", hex::encode(self.0))
    }
}

impl fmt::Display for HashX {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

// =============================================================================
// CLUSTER C: CLAIMS
// =============================================================================

/// 20-byte claim identity, `hash160(txid || nout_le32)` of the creating output.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct ClaimHash(pub [u8; 20]);

impl ClaimHash {
    /// Claim hash of a claim-name output.
    pub fn from_outpoint(outpoint: &Outpoint) -> Self {
        Self(hash160(&outpoint.to_bytes()))
    }

    /// The user-facing claim id: reversed hex of the hash.
    pub fn claim_id(&self) -> String {
        crate::hashing::hash_to_hex_str(&self.0)
    }

    /// Parse a full 40-character claim id.
    pub fn from_claim_id(claim_id: &str) -> Result<Self, IdentifierError> {
        let mut bytes =
            hex::decode(claim_id).map_err(|e| IdentifierError::InvalidHex(e.to_string()))?;
        Self::from_reversed(&mut bytes)
    }

    /// Claim hashes embedded in support and update scripts are stored
    /// reversed relative to the internal order.
    pub fn from_script_bytes(bytes: &[u8]) -> Result<Self, IdentifierError> {
        let mut owned = bytes.to_vec();
        Self::from_reversed(&mut owned)
    }

    fn from_reversed(bytes: &mut [u8]) -> Result<Self, IdentifierError> {
        if bytes.len() != 20 {
            return Err(IdentifierError::WrongLength {
                expected: 20,
                actual: bytes.len(),
            });
        }
        bytes.reverse();
        let mut out = [0u8; 20];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    /// Inverse of [`ClaimHash::from_script_bytes`].
    pub fn to_script_bytes(&self) -> Vec<u8> {
        let mut out = self.0.to_vec();
        out.reverse();
        out
    }
}

impl fmt::Debug for ClaimHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClaimHash({})", self.claim_id())
    }
}

impl fmt::Display for ClaimHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.claim_id())
    }
}

/// Fold a claim name: canonical decomposition followed by lowercasing.
///
/// Two names that normalize equal compete for the same trie slot.
pub fn normalize_name(name: &str) -> String {
    name.nfd().collect::<String>().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outpoint_bytes_roundtrip() {
        let outpoint = Outpoint::new([7u8; 32], 3);
        let bytes = outpoint.to_bytes();
        assert_eq!(&bytes[32..], &[3, 0, 0, 0]);
        assert_eq!(Outpoint::from_bytes(&bytes), Some(outpoint));
        assert_eq!(Outpoint::from_bytes(&bytes[..35]), None);
    }

    #[test]
    fn test_null_outpoint() {
        assert!(Outpoint::new(ZERO_HASH, u32::MAX).is_null());
        assert!(!Outpoint::new(ZERO_HASH, 0).is_null());
    }

    #[test]
    fn test_claim_id_is_reversed_hex() {
        let mut raw = [0u8; 20];
        raw[0] = 0xab;
        let claim_hash = ClaimHash(raw);
        let claim_id = claim_hash.claim_id();
        assert!(claim_id.ends_with("ab"));
        assert_eq!(ClaimHash::from_claim_id(&claim_id), Ok(claim_hash));
    }

    #[test]
    fn test_claim_hash_script_bytes_roundtrip() {
        let claim_hash = ClaimHash::from_outpoint(&Outpoint::new([1u8; 32], 0));
        let script_bytes = claim_hash.to_script_bytes();
        assert_eq!(ClaimHash::from_script_bytes(&script_bytes), Ok(claim_hash));
    }

    #[test]
    fn test_claim_hash_wrong_length() {
        assert_eq!(
            ClaimHash::from_script_bytes(&[0u8; 19]),
            Err(IdentifierError::WrongLength {
                expected: 20,
                actual: 19
            })
        );
    }

    #[test]
    fn test_hex_str_to_hash_reverses() {
        let hex = format!("{}01", "00".repeat(31));
        let hash = hex_str_to_hash(&hex).unwrap();
        assert_eq!(hash[0], 0x01);
        assert!(hex_str_to_hash("zz").is_err());
    }

    #[test]
    fn test_scripthash_to_hashx() {
        let mut digest = [0u8; 32];
        digest[0] = 0x42;
        let display = crate::hashing::hash_to_hex_str(&digest);
        let hashx = HashX::from_scripthash_hex(&display).unwrap();
        assert_eq!(hashx.0[0], 0x42);
    }

    #[test]
    fn test_normalize_name_folds_case_and_accents() {
        assert_eq!(normalize_name("Foo"), "foo");
        assert_eq!(normalize_name("Café"), normalize_name("cafe\u{301}"));
    }

    #[test]
    fn test_hashx_serde() {
        let hashx = HashX([9u8; HASHX_LEN]);
        let encoded = bincode::serialize(&hashx).unwrap();
        let decoded: HashX = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded, hashx);
        assert!(serde_json::to_string(&hashx).unwrap().len() > 2);
    }
}
