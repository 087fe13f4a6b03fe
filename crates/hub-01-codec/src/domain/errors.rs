//! # Codec Errors
//!
//! Decoding failures are values, never panics. Script failures are kept in
//! their own enum because callers treat them differently: a bad transaction
//! rejects the block, a bad script only makes one output unknown.

use thiserror::Error;

/// Errors raised while decoding or encoding wire structures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before a field was complete.
    #[error("unexpected end of data at offset {offset}: needed {needed} more bytes")]
    UnexpectedEof { offset: usize, needed: usize },

    /// A length prefix is larger than anything the format allows.
    #[error("length prefix {length} exceeds limit {limit}")]
    OversizedLength { length: u64, limit: u64 },

    /// Bytes were left over after a complete structure was decoded.
    #[error("{remaining} trailing bytes after {what}")]
    TrailingBytes { what: &'static str, remaining: usize },

    /// A segwit marker was followed by an unsupported flag byte.
    #[error("unsupported segwit flag {0:#04x}")]
    InvalidSegwitFlag(u8),

    /// Header bytes were not exactly one header long.
    #[error("header must be {expected} bytes, got {actual}")]
    InvalidHeaderLength { expected: usize, actual: usize },

    /// Claim value envelope is malformed.
    #[error("invalid claim value: {0}")]
    InvalidClaimValue(&'static str),

    /// Script failure surfaced through a codec call.
    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Errors raised by the script tokenizer and template matcher.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// A push opcode announced more bytes than remain in the script.
    #[error("push of {needed} bytes runs past end of script")]
    TruncatedPush { needed: usize },

    /// A data push appeared where the template expects a literal opcode.
    #[error("data token found where {expected} was expected")]
    UnexpectedData { expected: String },

    /// A small integer appeared where the template expects something else.
    #[error("small integer {value} found where {expected} was expected")]
    UnexpectedSmallInteger { value: u8, expected: String },

    /// A literal opcode did not match the template.
    #[error("opcode {found:#04x} does not match {expected}")]
    OpcodeMismatch { found: u8, expected: String },

    /// Fewer data pushes than push opcodes in a PUSH_MANY run.
    #[error("{data} data pushes cannot fill {opcodes} push opcodes")]
    NotEnoughData { data: usize, opcodes: usize },

    /// More than one PUSH_MANY in a single run of push opcodes.
    #[error("ambiguous allocation: more than one PUSH_MANY in a run")]
    AmbiguousPushMany,

    /// A run of pushes did not start with the PUSH_MANY.
    #[error("PUSH_MANY must lead its run of push opcodes")]
    MisplacedPushMany,

    /// The template ran out before the script did.
    #[error("parse finished with {0} unconsumed tokens")]
    UnconsumedTokens(usize),

    /// The script ran out before the template did.
    #[error("parse finished with {0} unconsumed opcodes")]
    UnconsumedOpcodes(usize),

    /// A pushed integer is wider than 64 bits.
    #[error("integer push of {0} bytes is too wide")]
    IntegerOverflow(usize),

    /// A matched template lacks a value its typed view needs.
    #[error("template value {0} missing")]
    MissingValue(&'static str),

    /// A pushed hash has the wrong width.
    #[error("expected a {expected}-byte hash, got {actual} bytes")]
    BadHashLength { expected: usize, actual: usize },

    /// No known template matched.
    #[error("script matches no known template")]
    NoMatchingTemplate,
}
