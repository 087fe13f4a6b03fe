//! # Script Tokenizer
//!
//! Splits a script into data pushes, small integers and bare opcodes.

use super::opcodes::{
    is_push_data_opcode, is_small_integer, OP_1, OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4,
};
use crate::domain::errors::ScriptError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Bytes introduced by a push opcode.
    Data(Vec<u8>),
    /// OP_1..OP_16, holding the decoded value 1..=16.
    SmallInteger(u8),
    /// Any other opcode, including OP_0.
    Opcode(u8),
}

fn take<'a>(script: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8], ScriptError> {
    match pos.checked_add(len).filter(|end| *end <= script.len()) {
        Some(end) => {
            let out = &script[*pos..end];
            *pos = end;
            Ok(out)
        }
        None => Err(ScriptError::TruncatedPush {
            needed: len.saturating_sub(script.len() - *pos),
        }),
    }
}

pub fn tokenize(script: &[u8]) -> Result<Vec<Token>, ScriptError> {
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < script.len() {
        let opcode = script[pos];
        pos += 1;
        if is_push_data_opcode(opcode) {
            let len = match opcode {
                OP_PUSHDATA1 => usize::from(take(script, &mut pos, 1)?[0]),
                OP_PUSHDATA2 => {
                    let raw = take(script, &mut pos, 2)?;
                    usize::from(u16::from_le_bytes([raw[0], raw[1]]))
                }
                OP_PUSHDATA4 => {
                    let raw = take(script, &mut pos, 4)?;
                    u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
                }
                direct => usize::from(direct),
            };
            tokens.push(Token::Data(take(script, &mut pos, len)?.to_vec()));
        } else if is_small_integer(opcode) {
            tokens.push(Token::SmallInteger(opcode - OP_1 + 1));
        } else {
            tokens.push(Token::Opcode(opcode));
        }
    }
    Ok(tokens)
}
