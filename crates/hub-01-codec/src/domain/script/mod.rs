//! # Scripts
//!
//! - `opcodes` - opcode constants
//! - `tokens` - script tokenizer
//! - `template` - template patterns and the lockstep parser
//! - `output` - typed output/input classification and hashX derivation
//! - `builder` - push encoding and script construction

pub mod builder;
pub mod opcodes;
pub mod output;
pub mod template;
pub mod tokens;

pub use output::{
    output_hashx, ClaimOperation, InputScript, OutputScript, PaymentDestination, RedeemScript,
};
pub use template::{Captures, TemplateKind, INPUT_TEMPLATES, OUTPUT_TEMPLATES};
