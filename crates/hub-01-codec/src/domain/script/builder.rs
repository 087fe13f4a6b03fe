//! Script construction: data pushes and the claim/payment script shapes.

use shared_types::ClaimHash;

use super::opcodes::*;

/// Append `data` with the shortest push encoding for its length.
pub fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len < usize::from(OP_PUSHDATA1) {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else if len <= 0xffff {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        script.push(OP_PUSHDATA4);
        script.extend_from_slice(&(len as u32).to_le_bytes());
    }
    script.extend_from_slice(data);
}

/// Little-endian two's-complement bytes, `(bit_length + 8) / 8` wide.
pub fn encode_integer(value: i64) -> Vec<u8> {
    let magnitude = value.unsigned_abs();
    let bit_length = (u64::BITS - magnitude.leading_zeros()) as usize;
    let width = ((bit_length + 8) / 8).min(8);
    value.to_le_bytes()[..width].to_vec()
}

pub fn push_integer(script: &mut Vec<u8>, value: i64) {
    push_data(script, &encode_integer(value));
}

pub fn pay_pubkey_hash(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = vec![OP_DUP, OP_HASH160];
    push_data(&mut script, pubkey_hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

pub fn pay_script_hash(script_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = vec![OP_HASH160];
    push_data(&mut script, script_hash);
    script.push(OP_EQUAL);
    script
}

pub fn pay_pubkey_full(pubkey: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(pubkey.len() + 2);
    push_data(&mut script, pubkey);
    script.push(OP_CHECKSIG);
    script
}

pub fn return_data(data: &[u8]) -> Vec<u8> {
    let mut script = vec![OP_RETURN];
    push_data(&mut script, data);
    script
}

/// `OP_CLAIM_NAME <name> <value> OP_2DROP OP_DROP <payment>`
pub fn claim_name(name: &[u8], value: &[u8], payment: &[u8]) -> Vec<u8> {
    let mut script = vec![OP_CLAIM_NAME];
    push_data(&mut script, name);
    push_data(&mut script, value);
    script.extend_from_slice(&[OP_2DROP, OP_DROP]);
    script.extend_from_slice(payment);
    script
}

/// `OP_SUPPORT_CLAIM <name> <claim_id> OP_2DROP OP_DROP <payment>`
pub fn support_claim(name: &[u8], claim_hash: &ClaimHash, payment: &[u8]) -> Vec<u8> {
    let mut script = vec![OP_SUPPORT_CLAIM];
    push_data(&mut script, name);
    push_data(&mut script, &claim_hash.to_script_bytes());
    script.extend_from_slice(&[OP_2DROP, OP_DROP]);
    script.extend_from_slice(payment);
    script
}

/// `OP_UPDATE_CLAIM <name> <claim_id> <value> OP_2DROP OP_2DROP <payment>`
pub fn update_claim(name: &[u8], claim_hash: &ClaimHash, value: &[u8], payment: &[u8]) -> Vec<u8> {
    let mut script = vec![OP_UPDATE_CLAIM];
    push_data(&mut script, name);
    push_data(&mut script, &claim_hash.to_script_bytes());
    push_data(&mut script, value);
    script.extend_from_slice(&[OP_2DROP, OP_2DROP]);
    script.extend_from_slice(payment);
    script
}

/// m-of-n `OP_CHECKMULTISIG` redeem script. `required` and the key count
/// must be 1..=16.
pub fn redeem_script(required: u8, pubkeys: &[Vec<u8>]) -> Vec<u8> {
    let mut script = vec![OP_1 + required.saturating_sub(1)];
    for key in pubkeys {
        push_data(&mut script, key);
    }
    script.push(OP_1 + (pubkeys.len() as u8).saturating_sub(1));
    script.push(OP_CHECKMULTISIG);
    script
}

/// Input script spending a P2SH multisig output.
pub fn redeem_script_hash(signatures: &[Vec<u8>], redeem: &[u8]) -> Vec<u8> {
    let mut script = vec![OP_0];
    for signature in signatures {
        push_data(&mut script, signature);
    }
    push_data(&mut script, redeem);
    script
}
