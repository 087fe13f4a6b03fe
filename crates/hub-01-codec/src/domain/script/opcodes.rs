//! Opcode values used by the recognised templates.

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_2DROP: u8 = 0x6d;
pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKMULTISIG: u8 = 0xae;
pub const OP_CLAIM_NAME: u8 = 0xb5;
pub const OP_SUPPORT_CLAIM: u8 = 0xb6;
pub const OP_UPDATE_CLAIM: u8 = 0xb7;

/// Opcodes 0x01..=OP_PUSHDATA4 introduce a data push.
pub fn is_push_data_opcode(opcode: u8) -> bool {
    (0x01..=OP_PUSHDATA4).contains(&opcode)
}

/// OP_1..=OP_16.
pub fn is_small_integer(opcode: u8) -> bool {
    (OP_1..=OP_16).contains(&opcode)
}

/// True for the three opcodes that open a claim script.
pub fn is_claim_opcode(opcode: u8) -> bool {
    matches!(opcode, OP_CLAIM_NAME | OP_SUPPORT_CLAIM | OP_UPDATE_CLAIM)
}
