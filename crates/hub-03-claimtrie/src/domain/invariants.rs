//! # Claim-Trie Invariants
//!
//! Whole-table consistency checks. Too slow to run per block on a large
//! trie; the engine checks the names it touched and tests call
//! [`check_invariants`] after every block.

use std::collections::BTreeSet;
use std::fmt;

use hub_02_storage::{ClaimRecord, ClaimTrieReader, StorageError};
use shared_types::{ClaimHash, Height};

/// A broken invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// The trie entry names a claim that no longer exists.
    DanglingControllingClaim { name: String, claim_hash: ClaimHash },
    /// The trie entry names a claim registered under another name.
    ControllingNameMismatch { name: String, claim_hash: ClaimHash },
    /// A name has an active claim but no trie entry.
    MissingControllingClaim { name: String },
    EffectiveAmountMismatch {
        claim_hash: ClaimHash,
        expected: u64,
        actual: u64,
    },
    ActivationBeforeCreation {
        claim_hash: ClaimHash,
        height: Height,
        activation: Height,
    },
    TakeoverInFuture { name: String, last_take_over: Height },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingControllingClaim { name, claim_hash } => {
                write!(f, "'{name}' controlled by missing claim {claim_hash}")
            }
            Self::ControllingNameMismatch { name, claim_hash } => {
                write!(f, "'{name}' controlled by {claim_hash} of another name")
            }
            Self::MissingControllingClaim { name } => {
                write!(f, "'{name}' has active claims but no controlling claim")
            }
            Self::EffectiveAmountMismatch {
                claim_hash,
                expected,
                actual,
            } => write!(f, "{claim_hash} effective amount {actual}, expected {expected}"),
            Self::ActivationBeforeCreation {
                claim_hash,
                height,
                activation,
            } => write!(f, "{claim_hash} activates at {activation} before creation at {height}"),
            Self::TakeoverInFuture {
                name,
                last_take_over,
            } => write!(f, "'{name}' last takeover {last_take_over} is in the future"),
        }
    }
}

/// Check the trie entry and claims of one name.
pub fn check_name<R: ClaimTrieReader + ?Sized>(
    reader: &R,
    name: &str,
    height: Height,
) -> Result<Vec<InvariantViolation>, StorageError> {
    let claims = reader.get_claims_by_name(name)?;
    let mut violations = Vec::new();
    match reader.get_trie_entry(name)? {
        Some(entry) => {
            if !claims.iter().any(|c| c.claim_hash == entry.claim_hash) {
                match reader.get_claim(&entry.claim_hash)? {
                    Some(_) => violations.push(InvariantViolation::ControllingNameMismatch {
                        name: name.to_string(),
                        claim_hash: entry.claim_hash,
                    }),
                    None => violations.push(InvariantViolation::DanglingControllingClaim {
                        name: name.to_string(),
                        claim_hash: entry.claim_hash,
                    }),
                }
            }
            if entry.last_take_over_height > height {
                violations.push(InvariantViolation::TakeoverInFuture {
                    name: name.to_string(),
                    last_take_over: entry.last_take_over_height,
                });
            }
        }
        None => {
            if claims.iter().any(|c| c.is_active_at(height)) {
                violations.push(InvariantViolation::MissingControllingClaim {
                    name: name.to_string(),
                });
            }
        }
    }
    for claim in &claims {
        check_claim(reader, claim, &mut violations)?;
    }
    Ok(violations)
}

fn check_claim<R: ClaimTrieReader + ?Sized>(
    reader: &R,
    claim: &ClaimRecord,
    violations: &mut Vec<InvariantViolation>,
) -> Result<(), StorageError> {
    let supports: u64 = reader
        .get_supports(&claim.claim_hash)?
        .iter()
        .map(|s| s.amount)
        .sum();
    let expected = claim.amount + supports;
    if claim.effective_amount != expected {
        violations.push(InvariantViolation::EffectiveAmountMismatch {
            claim_hash: claim.claim_hash,
            expected,
            actual: claim.effective_amount,
        });
    }
    if let Some(activation) = claim.activation_height {
        if activation < claim.height {
            violations.push(InvariantViolation::ActivationBeforeCreation {
                claim_hash: claim.claim_hash,
                height: claim.height,
                activation,
            });
        }
    }
    Ok(())
}

/// Check every name with a claim or a trie entry.
pub fn check_invariants<R: ClaimTrieReader + ?Sized>(
    reader: &R,
    height: Height,
) -> Result<Vec<InvariantViolation>, StorageError> {
    let mut names = BTreeSet::new();
    for claim in reader.all_claims()? {
        names.insert(claim.name);
    }
    for entry in reader.trie_entries()? {
        names.insert(entry.name);
    }
    let mut violations = Vec::new();
    for name in &names {
        violations.extend(check_name(reader, name, height)?);
    }
    Ok(violations)
}
