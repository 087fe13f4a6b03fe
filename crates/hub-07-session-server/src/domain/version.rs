//! Protocol version negotiation for `server.version`.

use std::fmt;

use serde_json::Value;

/// A dotted version such as `1.4`, compared part by part.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProtocolVersion(Vec<u32>);

impl ProtocolVersion {
    pub fn new(parts: &[u32]) -> Self {
        Self(parts.to_vec())
    }

    /// Unparseable strings read as version 0.
    pub fn parse(raw: &str) -> Self {
        raw.split('.')
            .map(str::parse::<u32>)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
            .unwrap_or_else(|_| Self::zero())
    }

    fn zero() -> Self {
        Self(vec![0])
    }

    fn is_zero(&self) -> bool {
        self.0 == [0]
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        if parts.len() < 2 {
            parts.push("0".into());
        }
        f.write_str(&parts.join("."))
    }
}

pub fn protocol_min() -> ProtocolVersion {
    ProtocolVersion::new(&[1, 1])
}

pub fn protocol_max() -> ProtocolVersion {
    ProtocolVersion::new(&[1, 4])
}

/// The highest version both sides speak, if any.
///
/// The client asks for nothing (the server minimum), a single version, or
/// a `[min, max]` pair.
pub fn negotiate(
    client: Option<&Value>,
    min: &ProtocolVersion,
    max: &ProtocolVersion,
) -> Option<ProtocolVersion> {
    let (client_min, client_max) = match client {
        None | Some(Value::Null) => (min.clone(), min.clone()),
        Some(Value::Array(pair)) if pair.len() == 2 => (version_of(&pair[0]), version_of(&pair[1])),
        Some(single) => (version_of(single), version_of(single)),
    };
    let result = client_max.min(max.clone());
    let floor = client_min.max(min.clone());
    (result >= floor && !result.is_zero()).then_some(result)
}

fn version_of(value: &Value) -> ProtocolVersion {
    match value {
        Value::String(s) => ProtocolVersion::parse(s),
        Value::Number(n) => ProtocolVersion::parse(&n.to_string()),
        _ => ProtocolVersion::zero(),
    }
}
