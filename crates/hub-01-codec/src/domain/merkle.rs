//! # Merkle Trees
//!
//! Bitcoin-style binary merkle tree over double-SHA-256: an odd node at any
//! level is paired with itself. Used for transaction inclusion proofs and for
//! header checkpoint proofs.

use shared_types::{double_sha256, Hash, ZERO_HASH};

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left);
    buf[32..].copy_from_slice(right);
    double_sha256(&buf)
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            [single] => hash_pair(single, single),
            _ => ZERO_HASH,
        })
        .collect()
}

/// Root of the tree over `hashes`. The empty tree has the zero root.
pub fn merkle_root(hashes: &[Hash]) -> Hash {
    if hashes.is_empty() {
        return ZERO_HASH;
    }
    let mut level = hashes.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Sibling path for the leaf at `index`, bottom-up, plus the root.
///
/// Returns `None` when `index` is out of range.
pub fn merkle_branch(hashes: &[Hash], index: usize) -> Option<(Vec<Hash>, Hash)> {
    if index >= hashes.len() {
        return None;
    }
    let mut branch = Vec::new();
    let mut level = hashes.to_vec();
    let mut position = index;
    while level.len() > 1 {
        let sibling = position ^ 1;
        branch.push(*level.get(sibling).unwrap_or(&level[position]));
        level = next_level(&level);
        position >>= 1;
    }
    Some((branch, level[0]))
}

/// Recompute the root from a leaf and its sibling path.
pub fn root_from_branch(leaf: Hash, index: usize, branch: &[Hash]) -> Hash {
    let mut current = leaf;
    let mut position = index;
    for sibling in branch {
        current = if position & 1 == 1 {
            hash_pair(sibling, &current)
        } else {
            hash_pair(&current, sibling)
        };
        position >>= 1;
    }
    current
}
