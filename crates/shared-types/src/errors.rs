//! # Error Types
//!
//! Errors raised while parsing identifiers shared across subsystems.

use thiserror::Error;

/// Errors from decoding hex identifiers (tx hashes, claim ids, script hashes).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// The value is not valid hexadecimal.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// The decoded value has the wrong length.
    #[error("Expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

/// Errors from decoding a base58check address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Base58 or checksum decoding failed.
    #[error("{address} is not a valid address")]
    Invalid { address: String },

    /// The version byte does not belong to the configured network.
    #[error("Unknown address version byte 0x{verbyte:02x}")]
    UnknownVersion { verbyte: u8 },
}
