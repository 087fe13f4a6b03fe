//! # Claim URLs
//!
//! ```text
//! [lbry://][@channel[#id|:seq|$rank]/]name[#id|:seq|$rank]
//! ```
//!
//! | Modifier | Selects |
//! |----------|---------|
//! | none | the controlling claim for the name |
//! | `#id` | the claim whose id starts with `id` |
//! | `:seq` | the `seq`-th claim for the name by activation height |
//! | `$rank` | the `rank`-th claim for the name by effective amount |

use std::fmt;

use shared_types::normalize_name;

use super::errors::UrlError;

const SCHEME: &str = "lbry://";

const INVALID_NAME_CHARS: &[char] = &[
    '=', '&', '#', ':', '$', '@', '%', '?', ';', '/', '\\', '"', '<', '>', '{', '}', '|', '^',
    '~', '[', ']', '`',
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modifier {
    /// Lowercase hex prefix of a claim id.
    ClaimId(String),
    /// 1-based position ordered by activation height.
    Sequence(u32),
    /// 1-based position ordered by effective amount, highest first.
    AmountOrder(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// Name as written, including the `@` of a channel.
    pub name: String,
    pub modifier: Option<Modifier>,
}

impl PathSegment {
    pub fn normalized(&self) -> String {
        normalize_name(&self.name)
    }

    fn parse(raw: &str) -> Result<Self, UrlError> {
        let split = raw.find(['#', ':', '$']);
        let (name, modifier) = match split {
            None => (raw, None),
            Some(at) => {
                let (name, rest) = raw.split_at(at);
                let value = &rest[1..];
                let modifier = match rest.as_bytes()[0] {
                    b'#' => Modifier::ClaimId(parse_claim_id(value)?),
                    b':' => Modifier::Sequence(parse_position(value)?),
                    _ => Modifier::AmountOrder(parse_position(value)?),
                };
                (name, Some(modifier))
            }
        };
        let bare = name.strip_prefix('@').unwrap_or(name);
        if bare.is_empty()
            || bare
                .chars()
                .any(|c| c.is_whitespace() || INVALID_NAME_CHARS.contains(&c))
        {
            return Err(UrlError::InvalidName(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            modifier,
        })
    }

    fn is_channel(&self) -> bool {
        self.name.starts_with('@')
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        match &self.modifier {
            None => Ok(()),
            Some(Modifier::ClaimId(id)) => write!(f, "#{id}"),
            Some(Modifier::Sequence(n)) => write!(f, ":{n}"),
            Some(Modifier::AmountOrder(n)) => write!(f, "${n}"),
        }
    }
}

fn parse_claim_id(value: &str) -> Result<String, UrlError> {
    if value.is_empty() || value.len() > 40 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(UrlError::InvalidClaimId(value.to_string()));
    }
    Ok(value.to_ascii_lowercase())
}

fn parse_position(value: &str) -> Result<u32, UrlError> {
    match value.parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(UrlError::InvalidNumber(value.to_string())),
    }
}

/// A parsed claim URL. At least one of `channel` and `stream` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimUrl {
    pub channel: Option<PathSegment>,
    pub stream: Option<PathSegment>,
}

impl ClaimUrl {
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let raw = raw.trim();
        let path = match raw.strip_prefix(SCHEME) {
            Some(path) => path,
            None if raw.contains("://") => return Err(UrlError::Scheme(raw.to_string())),
            None => raw,
        };
        if path.is_empty() {
            return Err(UrlError::Empty);
        }
        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            [single] => {
                let segment = PathSegment::parse(single)?;
                Ok(if segment.is_channel() {
                    Self {
                        channel: Some(segment),
                        stream: None,
                    }
                } else {
                    Self {
                        channel: None,
                        stream: Some(segment),
                    }
                })
            }
            [channel, stream] => {
                let channel = PathSegment::parse(channel)?;
                if !channel.is_channel() {
                    return Err(UrlError::NotAChannel(channel.name));
                }
                let stream = PathSegment::parse(stream)?;
                if stream.is_channel() {
                    return Err(UrlError::NotAStream(stream.name));
                }
                Ok(Self {
                    channel: Some(channel),
                    stream: Some(stream),
                })
            }
            _ => Err(UrlError::TooManySegments),
        }
    }
}

impl fmt::Display for ClaimUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SCHEME)?;
        match (&self.channel, &self.stream) {
            (Some(channel), Some(stream)) => write!(f, "{channel}/{stream}"),
            (Some(segment), None) | (None, Some(segment)) => write!(f, "{segment}"),
            (None, None) => Ok(()),
        }
    }
}
