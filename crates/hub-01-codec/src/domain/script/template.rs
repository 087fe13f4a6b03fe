//! # Script Templates
//!
//! Every recognised script shape is a [`TemplateKind`]. A kind expands to a
//! fixed opcode pattern ([`Op`]) which the [`Parser`] walks in lockstep with
//! the token stream, collecting named values.
//!
//! ## Push allocation
//!
//! `PushMany` takes a variable number of data pushes. When it is followed by
//! further push opcodes, those are filled first from the end of the run of
//! data tokens (last token to last opcode), and `PushMany` takes whatever
//! is left. Two `PushMany` in one run cannot be allocated unambiguously and
//! are rejected.

use std::collections::BTreeMap;

use super::opcodes::*;
use super::tokens::{tokenize, Token};
use crate::domain::errors::ScriptError;

/// One element of a template pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Exactly this opcode.
    Literal(u8),
    /// One data push, stored as bytes.
    PushSingle(&'static str),
    /// One data push, decoded as a signed little-endian integer.
    PushInteger(&'static str),
    /// Zero or more data pushes.
    PushMany(&'static str),
    /// One data push that is itself a script matching the given template.
    PushSubscript(&'static str, TemplateKind),
    /// OP_1..OP_16.
    SmallInteger(&'static str),
}

impl Op {
    fn is_push(&self) -> bool {
        matches!(
            self,
            Op::PushSingle(_) | Op::PushInteger(_) | Op::PushMany(_) | Op::PushSubscript(..)
        )
    }

    fn describe(&self) -> String {
        match self {
            Op::Literal(opcode) => format!("{opcode:#04x}"),
            Op::PushSingle(name)
            | Op::PushInteger(name)
            | Op::PushMany(name)
            | Op::PushSubscript(name, _)
            | Op::SmallInteger(name) => (*name).to_string(),
        }
    }
}

/// A value captured by a named [`Op`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bytes(Vec<u8>),
    Integer(i64),
    Many(Vec<Vec<u8>>),
    SmallInteger(u8),
    Subscript(Box<Captures>),
}

/// Named values captured by a successful parse.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Captures {
    values: BTreeMap<&'static str, Value>,
}

impl Captures {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        match self.values.get(name)? {
            Value::Bytes(bytes) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.values.get(name)? {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn many(&self, name: &str) -> Option<&[Vec<u8>]> {
        match self.values.get(name)? {
            Value::Many(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn small_integer(&self, name: &str) -> Option<u8> {
        match self.values.get(name)? {
            Value::SmallInteger(value) => Some(*value),
            _ => None,
        }
    }

    pub fn subscript(&self, name: &str) -> Option<&Captures> {
        match self.values.get(name)? {
            Value::Subscript(captures) => Some(captures.as_ref()),
            _ => None,
        }
    }

    fn insert(&mut self, name: &'static str, value: Value) {
        self.values.insert(name, value);
    }
}

/// The closed set of recognised script shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    PayPubkeyFull,
    PayPubkeyHash,
    PayScriptHash,
    ReturnData,
    ClaimNamePubkeyFull,
    ClaimNamePubkeyHash,
    ClaimNameScriptHash,
    SupportClaimPubkeyFull,
    SupportClaimPubkeyHash,
    SupportClaimScriptHash,
    UpdateClaimPubkeyFull,
    UpdateClaimPubkeyHash,
    UpdateClaimScriptHash,
    /// Input: signature only.
    RedeemPubkey,
    /// Input: signature and public key.
    RedeemPubkeyHash,
    /// m-of-n multisig redeem script.
    RedeemScript,
    /// Input spending a P2SH multisig output.
    RedeemScriptHash,
}

/// Output templates, in the order they are tried.
pub const OUTPUT_TEMPLATES: [TemplateKind; 13] = [
    TemplateKind::PayPubkeyFull,
    TemplateKind::PayPubkeyHash,
    TemplateKind::PayScriptHash,
    TemplateKind::ReturnData,
    TemplateKind::ClaimNamePubkeyFull,
    TemplateKind::ClaimNamePubkeyHash,
    TemplateKind::ClaimNameScriptHash,
    TemplateKind::SupportClaimPubkeyFull,
    TemplateKind::SupportClaimPubkeyHash,
    TemplateKind::SupportClaimScriptHash,
    TemplateKind::UpdateClaimPubkeyFull,
    TemplateKind::UpdateClaimPubkeyHash,
    TemplateKind::UpdateClaimScriptHash,
];

/// Input templates, in the order they are tried.
pub const INPUT_TEMPLATES: [TemplateKind; 3] = [
    TemplateKind::RedeemPubkey,
    TemplateKind::RedeemPubkeyHash,
    TemplateKind::RedeemScriptHash,
];

const PAY_PUBKEY_FULL: [Op; 2] = [Op::PushSingle("pubkey"), Op::Literal(OP_CHECKSIG)];

const PAY_PUBKEY_HASH: [Op; 5] = [
    Op::Literal(OP_DUP),
    Op::Literal(OP_HASH160),
    Op::PushSingle("pubkey_hash"),
    Op::Literal(OP_EQUALVERIFY),
    Op::Literal(OP_CHECKSIG),
];

const PAY_SCRIPT_HASH: [Op; 3] = [
    Op::Literal(OP_HASH160),
    Op::PushSingle("script_hash"),
    Op::Literal(OP_EQUAL),
];

const CLAIM_NAME: [Op; 5] = [
    Op::Literal(OP_CLAIM_NAME),
    Op::PushSingle("claim_name"),
    Op::PushSingle("claim"),
    Op::Literal(OP_2DROP),
    Op::Literal(OP_DROP),
];

const SUPPORT_CLAIM: [Op; 5] = [
    Op::Literal(OP_SUPPORT_CLAIM),
    Op::PushSingle("claim_name"),
    Op::PushSingle("claim_id"),
    Op::Literal(OP_2DROP),
    Op::Literal(OP_DROP),
];

const UPDATE_CLAIM: [Op; 6] = [
    Op::Literal(OP_UPDATE_CLAIM),
    Op::PushSingle("claim_name"),
    Op::PushSingle("claim_id"),
    Op::PushSingle("claim"),
    Op::Literal(OP_2DROP),
    Op::Literal(OP_2DROP),
];

impl TemplateKind {
    pub fn name(&self) -> &'static str {
        match self {
            TemplateKind::PayPubkeyFull => "pay_pubkey_full",
            TemplateKind::PayPubkeyHash => "pay_pubkey_hash",
            TemplateKind::PayScriptHash => "pay_script_hash",
            TemplateKind::ReturnData => "return_data",
            TemplateKind::ClaimNamePubkeyFull => "claim_name+pay_pubkey_full",
            TemplateKind::ClaimNamePubkeyHash => "claim_name+pay_pubkey_hash",
            TemplateKind::ClaimNameScriptHash => "claim_name+pay_script_hash",
            TemplateKind::SupportClaimPubkeyFull => "support_claim+pay_pubkey_full",
            TemplateKind::SupportClaimPubkeyHash => "support_claim+pay_pubkey_hash",
            TemplateKind::SupportClaimScriptHash => "support_claim+pay_script_hash",
            TemplateKind::UpdateClaimPubkeyFull => "update_claim+pay_pubkey_full",
            TemplateKind::UpdateClaimPubkeyHash => "update_claim+pay_pubkey_hash",
            TemplateKind::UpdateClaimScriptHash => "update_claim+pay_script_hash",
            TemplateKind::RedeemPubkey => "pubkey",
            TemplateKind::RedeemPubkeyHash => "pubkey_hash",
            TemplateKind::RedeemScript => "redeem_script",
            TemplateKind::RedeemScriptHash => "script_hash",
        }
    }

    pub fn opcodes(&self) -> Vec<Op> {
        let join = |claim: &[Op], payment: &[Op]| [claim, payment].concat();
        match self {
            TemplateKind::PayPubkeyFull => PAY_PUBKEY_FULL.to_vec(),
            TemplateKind::PayPubkeyHash => PAY_PUBKEY_HASH.to_vec(),
            TemplateKind::PayScriptHash => PAY_SCRIPT_HASH.to_vec(),
            TemplateKind::ReturnData => vec![Op::Literal(OP_RETURN), Op::PushSingle("data")],
            TemplateKind::ClaimNamePubkeyFull => join(&CLAIM_NAME, &PAY_PUBKEY_FULL),
            TemplateKind::ClaimNamePubkeyHash => join(&CLAIM_NAME, &PAY_PUBKEY_HASH),
            TemplateKind::ClaimNameScriptHash => join(&CLAIM_NAME, &PAY_SCRIPT_HASH),
            TemplateKind::SupportClaimPubkeyFull => join(&SUPPORT_CLAIM, &PAY_PUBKEY_FULL),
            TemplateKind::SupportClaimPubkeyHash => join(&SUPPORT_CLAIM, &PAY_PUBKEY_HASH),
            TemplateKind::SupportClaimScriptHash => join(&SUPPORT_CLAIM, &PAY_SCRIPT_HASH),
            TemplateKind::UpdateClaimPubkeyFull => join(&UPDATE_CLAIM, &PAY_PUBKEY_FULL),
            TemplateKind::UpdateClaimPubkeyHash => join(&UPDATE_CLAIM, &PAY_PUBKEY_HASH),
            TemplateKind::UpdateClaimScriptHash => join(&UPDATE_CLAIM, &PAY_SCRIPT_HASH),
            TemplateKind::RedeemPubkey => vec![Op::PushSingle("signature")],
            TemplateKind::RedeemPubkeyHash => {
                vec![Op::PushSingle("signature"), Op::PushSingle("pubkey")]
            }
            TemplateKind::RedeemScript => vec![
                Op::SmallInteger("signatures_count"),
                Op::PushMany("pubkeys"),
                Op::SmallInteger("pubkeys_count"),
                Op::Literal(OP_CHECKMULTISIG),
            ],
            TemplateKind::RedeemScriptHash => vec![
                Op::Literal(OP_0),
                Op::PushMany("signatures"),
                Op::PushSubscript("script", TemplateKind::RedeemScript),
            ],
        }
    }

    /// Tokenize and match `script` against this template.
    pub fn parse(&self, script: &[u8]) -> Result<Captures, ScriptError> {
        let tokens = tokenize(script)?;
        Parser::new(self.opcodes(), tokens).parse()
    }
}

/// Try `templates` in order; first match wins.
pub fn match_first(
    templates: &[TemplateKind],
    script: &[u8],
) -> Result<(TemplateKind, Captures), ScriptError> {
    let tokens = tokenize(script)?;
    for kind in templates {
        if let Ok(captures) = Parser::new(kind.opcodes(), tokens.clone()).parse() {
            return Ok((*kind, captures));
        }
    }
    Err(ScriptError::NoMatchingTemplate)
}

/// Decode a little-endian two's-complement integer push.
pub fn decode_integer(bytes: &[u8]) -> Result<i64, ScriptError> {
    if bytes.len() > 8 {
        return Err(ScriptError::IntegerOverflow(bytes.len()));
    }
    let Some(last) = bytes.last() else {
        return Ok(0);
    };
    let fill = if last & 0x80 != 0 { 0xff } else { 0x00 };
    let mut buf = [fill; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(i64::from_le_bytes(buf))
}

/// Walks opcodes and tokens in lockstep.
pub struct Parser {
    opcodes: Vec<Op>,
    tokens: Vec<Token>,
    captures: Captures,
    token_index: usize,
    opcode_index: usize,
}

impl Parser {
    pub fn new(opcodes: Vec<Op>, tokens: Vec<Token>) -> Self {
        Self {
            opcodes,
            tokens,
            captures: Captures::default(),
            token_index: 0,
            opcode_index: 0,
        }
    }

    pub fn parse(mut self) -> Result<Captures, ScriptError> {
        while self.token_index < self.tokens.len() && self.opcode_index < self.opcodes.len() {
            let opcode = self.opcodes[self.opcode_index];
            let mut token = self.tokens[self.token_index].clone();

            // OP_0 in a single-push slot is an empty push.
            if token == Token::Opcode(OP_0) && matches!(opcode, Op::PushSingle(_)) {
                token = Token::Data(Vec::new());
            }

            match token {
                Token::Data(data) => match opcode {
                    Op::PushMany(_) => {
                        self.consume_many_non_greedy()?;
                        continue;
                    }
                    Op::PushSingle(_) | Op::PushInteger(_) | Op::PushSubscript(..) => {
                        self.push_single(opcode, data)?;
                    }
                    Op::Literal(_) | Op::SmallInteger(_) => {
                        return Err(ScriptError::UnexpectedData {
                            expected: opcode.describe(),
                        })
                    }
                },
                Token::SmallInteger(value) => match opcode {
                    Op::SmallInteger(name) => self.captures.insert(name, Value::SmallInteger(value)),
                    other => {
                        return Err(ScriptError::UnexpectedSmallInteger {
                            value,
                            expected: other.describe(),
                        })
                    }
                },
                Token::Opcode(found) => {
                    if opcode != Op::Literal(found) {
                        return Err(ScriptError::OpcodeMismatch {
                            found,
                            expected: opcode.describe(),
                        });
                    }
                }
            }
            self.token_index += 1;
            self.opcode_index += 1;
        }

        if self.token_index < self.tokens.len() {
            return Err(ScriptError::UnconsumedTokens(
                self.tokens.len() - self.token_index,
            ));
        }
        if self.opcode_index < self.opcodes.len() {
            return Err(ScriptError::UnconsumedOpcodes(
                self.opcodes.len() - self.opcode_index,
            ));
        }
        Ok(self.captures)
    }

    fn push_single(&mut self, opcode: Op, data: Vec<u8>) -> Result<(), ScriptError> {
        match opcode {
            Op::PushSingle(name) => self.captures.insert(name, Value::Bytes(data)),
            Op::PushInteger(name) => {
                self.captures
                    .insert(name, Value::Integer(decode_integer(&data)?));
            }
            Op::PushSubscript(name, kind) => {
                let nested = kind.parse(&data)?;
                self.captures.insert(name, Value::Subscript(Box::new(nested)));
            }
            other => {
                return Err(ScriptError::UnexpectedData {
                    expected: other.describe(),
                })
            }
        }
        Ok(())
    }

    /// Allocate a run of data tokens to a run of push opcodes headed by a
    /// `PushMany`. Trailing single pushes are satisfied first.
    fn consume_many_non_greedy(&mut self) -> Result<(), ScriptError> {
        let mut data = Vec::new();
        while let Some(token) = self.tokens.get(self.token_index) {
            match token {
                Token::Data(bytes) => data.push(bytes.clone()),
                Token::Opcode(OP_0) => data.push(Vec::new()),
                _ => break,
            }
            self.token_index += 1;
        }

        let mut run = Vec::new();
        while let Some(opcode) = self.opcodes.get(self.opcode_index) {
            if !opcode.is_push() {
                break;
            }
            run.push(*opcode);
            self.opcode_index += 1;
        }

        if data.len() < run.len() {
            return Err(ScriptError::NotEnoughData {
                data: data.len(),
                opcodes: run.len(),
            });
        }
        if run.iter().filter(|op| matches!(op, Op::PushMany(_))).count() > 1 {
            return Err(ScriptError::AmbiguousPushMany);
        }

        let Some((Op::PushMany(many), singles)) = run.split_first() else {
            return Err(ScriptError::NotEnoughData {
                data: data.len(),
                opcodes: run.len(),
            });
        };
        for opcode in singles.iter().rev() {
            let value = data.pop().unwrap_or_default();
            self.push_single(*opcode, value)?;
        }
        self.captures.insert(many, Value::Many(data));
        Ok(())
    }
}
