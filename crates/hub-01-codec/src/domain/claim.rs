//! # Claim Values
//!
//! The value pushed by claim-name and update-claim scripts is an envelope
//! around a protobuf payload:
//!
//! ```text
//! 0x00 <payload>                                   unsigned
//! 0x01 <channel hash: 20> <signature: 64> <payload> signed by a channel
//! ```
//!
//! Only the envelope and the payload's first field key are interpreted. The
//! signature is carried through, not verified.

use serde::{Deserialize, Serialize};
use shared_types::ClaimHash;

use super::errors::CodecError;

const SIGNATURE_LEN: usize = 64;

/// Kind of claim, from the first protobuf field of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimKind {
    Stream,
    Channel,
    Collection,
    Repost,
    Unknown,
}

impl ClaimKind {
    fn from_field_key(key: Option<u8>) -> Self {
        match key {
            Some(0x0a) => ClaimKind::Stream,
            Some(0x12) => ClaimKind::Channel,
            Some(0x1a) => ClaimKind::Collection,
            Some(0x22) => ClaimKind::Repost,
            _ => ClaimKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimKind::Stream => "stream",
            ClaimKind::Channel => "channel",
            ClaimKind::Collection => "collection",
            ClaimKind::Repost => "repost",
            ClaimKind::Unknown => "unknown",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "stream" => Some(ClaimKind::Stream),
            "channel" => Some(ClaimKind::Channel),
            "collection" => Some(ClaimKind::Collection),
            "repost" => Some(ClaimKind::Repost),
            _ => None,
        }
    }
}

/// Decoded claim value envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimValue {
    pub kind: ClaimKind,
    pub signing_channel: Option<ClaimHash>,
    pub signature: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl ClaimValue {
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let (&marker, rest) = bytes
            .split_first()
            .ok_or(CodecError::InvalidClaimValue("empty value"))?;
        match marker {
            0x00 => Ok(Self {
                kind: ClaimKind::from_field_key(rest.first().copied()),
                signing_channel: None,
                signature: None,
                payload: rest.to_vec(),
            }),
            0x01 => {
                if rest.len() < 20 + SIGNATURE_LEN {
                    return Err(CodecError::InvalidClaimValue("signed value too short"));
                }
                let mut channel = [0u8; 20];
                channel.copy_from_slice(&rest[..20]);
                let payload = &rest[20 + SIGNATURE_LEN..];
                Ok(Self {
                    kind: ClaimKind::from_field_key(payload.first().copied()),
                    signing_channel: Some(ClaimHash(channel)),
                    signature: Some(rest[20..20 + SIGNATURE_LEN].to_vec()),
                    payload: payload.to_vec(),
                })
            }
            _ => Err(CodecError::InvalidClaimValue("unknown envelope marker")),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match (&self.signing_channel, &self.signature) {
            (Some(channel), Some(signature)) => {
                let mut out = Vec::with_capacity(1 + 20 + SIGNATURE_LEN + self.payload.len());
                out.push(0x01);
                out.extend_from_slice(&channel.0);
                let mut padded = signature.clone();
                padded.resize(SIGNATURE_LEN, 0);
                out.extend_from_slice(&padded);
                out.extend_from_slice(&self.payload);
                out
            }
            _ => {
                let mut out = Vec::with_capacity(1 + self.payload.len());
                out.push(0x00);
                out.extend_from_slice(&self.payload);
                out
            }
        }
    }

    /// Unsigned value of the given kind with `body` as the field payload.
    pub fn unsigned(kind: ClaimKind, body: &[u8]) -> Self {
        Self {
            kind,
            signing_channel: None,
            signature: None,
            payload: field_payload(kind, body),
        }
    }

    /// Value signed by `channel` (with a placeholder signature).
    pub fn signed(kind: ClaimKind, body: &[u8], channel: ClaimHash) -> Self {
        Self {
            kind,
            signing_channel: Some(channel),
            signature: Some(vec![0u8; SIGNATURE_LEN]),
            payload: field_payload(kind, body),
        }
    }
}

/// Length-delimited protobuf field for the kind's top-level message.
fn field_payload(kind: ClaimKind, body: &[u8]) -> Vec<u8> {
    let key = match kind {
        ClaimKind::Stream => 0x0a,
        ClaimKind::Channel => 0x12,
        ClaimKind::Collection => 0x1a,
        ClaimKind::Repost => 0x22,
        ClaimKind::Unknown => return body.to_vec(),
    };
    let mut out = vec![key];
    let mut len = body.len();
    // varint length
    loop {
        let byte = (len & 0x7f) as u8;
        len >>= 7;
        if len == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out.extend_from_slice(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_stream() {
        let value = ClaimValue::unsigned(ClaimKind::Stream, b"title");
        let decoded = ClaimValue::decode(&value.encode()).unwrap();
        assert_eq!(decoded.kind, ClaimKind::Stream);
        assert_eq!(decoded.signing_channel, None);
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_signed_value_carries_channel() {
        let channel = ClaimHash([7u8; 20]);
        let value = ClaimValue::signed(ClaimKind::Repost, b"x", channel);
        let raw = value.encode();
        assert_eq!(raw[0], 0x01);
        let decoded = ClaimValue::decode(&raw).unwrap();
        assert_eq!(decoded.signing_channel, Some(channel));
        assert_eq!(decoded.kind, ClaimKind::Repost);
    }

    #[test]
    fn test_malformed_envelopes() {
        assert!(ClaimValue::decode(&[]).is_err());
        assert!(ClaimValue::decode(&[0x01, 0x00]).is_err());
        assert!(ClaimValue::decode(&[0x05]).is_err());
        assert_eq!(ClaimValue::decode(&[0x00]).unwrap().kind, ClaimKind::Unknown);
    }

    #[test]
    fn test_long_body_uses_multibyte_varint() {
        let body = vec![1u8; 300];
        let value = ClaimValue::unsigned(ClaimKind::Channel, &body);
        assert_eq!(&value.payload[..3], &[0x12, 0xac, 0x02]);
    }
}
