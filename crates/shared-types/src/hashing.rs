//! # Hashing Helpers
//!
//! The handful of digests the hub needs: SHA-256, double SHA-256 (block and
//! transaction ids) and HASH160 (claim ids, addresses).

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::entities::{Hash, HashX, HASHX_LEN};

/// Single SHA-256.
pub fn sha256(data: &[u8]) -> Hash {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// SHA-256 applied twice; used for header and transaction ids.
pub fn double_sha256(data: &[u8]) -> Hash {
    sha256(&sha256(data))
}

/// RIPEMD-160 of SHA-256.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&Ripemd160::digest(sha256(data)));
    out
}

/// Truncated SHA-256 of a payment script.
pub fn hashx_from_payment_script(script: &[u8]) -> HashX {
    let digest = sha256(script);
    let mut out = [0u8; HASHX_LEN];
    out.copy_from_slice(&digest[..HASHX_LEN]);
    HashX(out)
}

/// Hex of a hash in display (reversed) byte order.
pub fn hash_to_hex_str(hash: &[u8]) -> String {
    let mut reversed = hash.to_vec();
    reversed.reverse();
    hex::encode(reversed)
}
