//! # Output and Input Scripts
//!
//! Typed views over [`TemplateKind`] matches. Classification never panics:
//! anything that matches no template is reported as a [`ScriptError`] and
//! the caller decides what an unknown output means.

use shared_types::{hash160, hashx_from_payment_script, ClaimHash, HashX};

use super::builder::{pay_pubkey_hash, pay_script_hash};
use super::opcodes::{is_claim_opcode, OP_RETURN};
use super::template::{match_first, Captures, TemplateKind, INPUT_TEMPLATES, OUTPUT_TEMPLATES};
use crate::domain::errors::ScriptError;

/// Where an output's value can be spent from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentDestination {
    PubkeyHash([u8; 20]),
    ScriptHash([u8; 20]),
    PubkeyFull(Vec<u8>),
}

impl PaymentDestination {
    /// The bare payment script for this destination.
    pub fn script(&self) -> Vec<u8> {
        match self {
            PaymentDestination::PubkeyHash(hash) => pay_pubkey_hash(hash),
            PaymentDestination::ScriptHash(hash) => pay_script_hash(hash),
            PaymentDestination::PubkeyFull(pubkey) => super::builder::pay_pubkey_full(pubkey),
        }
    }
}

/// The claim operation carried by a claim script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOperation {
    ClaimName {
        name: Vec<u8>,
        value: Vec<u8>,
    },
    SupportClaim {
        name: Vec<u8>,
        claim_hash: ClaimHash,
    },
    UpdateClaim {
        name: Vec<u8>,
        claim_hash: ClaimHash,
        value: Vec<u8>,
    },
}

impl ClaimOperation {
    pub fn name(&self) -> &[u8] {
        match self {
            ClaimOperation::ClaimName { name, .. }
            | ClaimOperation::SupportClaim { name, .. }
            | ClaimOperation::UpdateClaim { name, .. } => name,
        }
    }
}

/// A classified output script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputScript {
    Payment(PaymentDestination),
    Claim {
        operation: ClaimOperation,
        payment: PaymentDestination,
    },
    ReturnData(Vec<u8>),
}

fn hash20(bytes: &[u8]) -> Result<[u8; 20], ScriptError> {
    bytes.try_into().map_err(|_| ScriptError::BadHashLength {
        expected: 20,
        actual: bytes.len(),
    })
}

fn required<'a>(captures: &'a Captures, name: &'static str) -> Result<&'a [u8], ScriptError> {
    captures.bytes(name).ok_or(ScriptError::MissingValue(name))
}

/// The payment half of a matched output, by whichever destination it captured.
fn payment_of(captures: &Captures) -> Result<PaymentDestination, ScriptError> {
    if let Some(hash) = captures.bytes("pubkey_hash") {
        return Ok(PaymentDestination::PubkeyHash(hash20(hash)?));
    }
    if let Some(hash) = captures.bytes("script_hash") {
        return Ok(PaymentDestination::ScriptHash(hash20(hash)?));
    }
    Ok(PaymentDestination::PubkeyFull(
        required(captures, "pubkey")?.to_vec(),
    ))
}

fn claim_hash_of(captures: &Captures) -> Result<ClaimHash, ScriptError> {
    let raw = required(captures, "claim_id")?;
    ClaimHash::from_script_bytes(raw).map_err(|_| ScriptError::BadHashLength {
        expected: 20,
        actual: raw.len(),
    })
}

impl OutputScript {
    /// Classify `script` against the output templates, in order.
    pub fn parse(script: &[u8]) -> Result<Self, ScriptError> {
        let (kind, captures) = match_first(&OUTPUT_TEMPLATES, script)?;
        Self::from_captures(kind, &captures)
    }

    fn from_captures(kind: TemplateKind, captures: &Captures) -> Result<Self, ScriptError> {
        let name = || required(captures, "claim_name").map(<[u8]>::to_vec);
        let value = || required(captures, "claim").map(<[u8]>::to_vec);

        let claim = |operation: ClaimOperation| -> Result<Self, ScriptError> {
            Ok(OutputScript::Claim {
                operation,
                payment: payment_of(captures)?,
            })
        };

        match kind {
            TemplateKind::PayPubkeyFull
            | TemplateKind::PayPubkeyHash
            | TemplateKind::PayScriptHash => Ok(OutputScript::Payment(payment_of(captures)?)),
            TemplateKind::ReturnData => Ok(OutputScript::ReturnData(
                required(captures, "data")?.to_vec(),
            )),
            TemplateKind::ClaimNamePubkeyFull
            | TemplateKind::ClaimNamePubkeyHash
            | TemplateKind::ClaimNameScriptHash => claim(ClaimOperation::ClaimName {
                name: name()?,
                value: value()?,
            }),
            TemplateKind::SupportClaimPubkeyFull
            | TemplateKind::SupportClaimPubkeyHash
            | TemplateKind::SupportClaimScriptHash => claim(ClaimOperation::SupportClaim {
                name: name()?,
                claim_hash: claim_hash_of(captures)?,
            }),
            TemplateKind::UpdateClaimPubkeyFull
            | TemplateKind::UpdateClaimPubkeyHash
            | TemplateKind::UpdateClaimScriptHash => claim(ClaimOperation::UpdateClaim {
                name: name()?,
                claim_hash: claim_hash_of(captures)?,
                value: value()?,
            }),
            TemplateKind::RedeemPubkey
            | TemplateKind::RedeemPubkeyHash
            | TemplateKind::RedeemScript
            | TemplateKind::RedeemScriptHash => Err(ScriptError::NoMatchingTemplate),
        }
    }

    pub fn claim(&self) -> Option<&ClaimOperation> {
        match self {
            OutputScript::Claim { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

/// Index key of an output: `sha256` of its payment script, truncated.
///
/// Claim scripts are keyed by the payment script they wrap; a wrapped bare
/// pubkey is keyed as the P2PKH of its `hash160`. Claim scripts that fail to
/// parse fall back to their own bytes. Empty and `OP_RETURN` scripts have none.
pub fn output_hashx(script: &[u8]) -> Option<HashX> {
    match script.first() {
        None | Some(&OP_RETURN) => None,
        Some(&opcode) if is_claim_opcode(opcode) => match OutputScript::parse(script) {
            Ok(OutputScript::Claim {
                payment: PaymentDestination::PubkeyFull(pubkey),
                ..
            }) => Some(hashx_from_payment_script(&pay_pubkey_hash(&hash160(&pubkey)))),
            Ok(OutputScript::Claim { payment, .. }) => {
                Some(hashx_from_payment_script(&payment.script()))
            }
            _ => Some(hashx_from_payment_script(script)),
        },
        Some(_) => Some(hashx_from_payment_script(script)),
    }
}

/// A multisig redeem script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemScript {
    pub required: u8,
    pub pubkeys: Vec<Vec<u8>>,
}

/// A classified input (unlocking) script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputScript {
    Pubkey {
        signature: Vec<u8>,
    },
    PubkeyHash {
        signature: Vec<u8>,
        pubkey: Vec<u8>,
    },
    ScriptHash {
        signatures: Vec<Vec<u8>>,
        redeem: RedeemScript,
    },
}

impl InputScript {
    pub fn parse(script: &[u8]) -> Result<Self, ScriptError> {
        let (kind, captures) = match_first(&INPUT_TEMPLATES, script)?;
        match kind {
            TemplateKind::RedeemPubkey => Ok(InputScript::Pubkey {
                signature: required(&captures, "signature")?.to_vec(),
            }),
            TemplateKind::RedeemPubkeyHash => Ok(InputScript::PubkeyHash {
                signature: required(&captures, "signature")?.to_vec(),
                pubkey: required(&captures, "pubkey")?.to_vec(),
            }),
            TemplateKind::RedeemScriptHash => {
                let nested = captures
                    .subscript("script")
                    .ok_or(ScriptError::NoMatchingTemplate)?;
                let pubkeys = nested.many("pubkeys").unwrap_or_default().to_vec();
                if nested.small_integer("pubkeys_count") != Some(pubkeys.len() as u8) {
                    return Err(ScriptError::NotEnoughData {
                        data: pubkeys.len(),
                        opcodes: usize::from(nested.small_integer("pubkeys_count").unwrap_or(0)),
                    });
                }
                Ok(InputScript::ScriptHash {
                    signatures: captures.many("signatures").unwrap_or_default().to_vec(),
                    redeem: RedeemScript {
                        required: nested.small_integer("signatures_count").unwrap_or(0),
                        pubkeys,
                    },
                })
            }
            _ => Err(ScriptError::NoMatchingTemplate),
        }
    }
}
