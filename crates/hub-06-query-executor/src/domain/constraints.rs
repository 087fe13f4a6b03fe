//! # Search Constraints
//!
//! `blockchain.claimtrie.search` parameters, validated up front so a bad
//! request never reaches a worker.
//!
//! | Key | Value |
//! |-----|-------|
//! | `name` | exact name, normalized |
//! | `text` | full-text query, results ranked by relevance |
//! | `claim_id` | full id or id prefix |
//! | `claim_ids` | list of full ids |
//! | `txid`, `nout` | the claim's current outpoint |
//! | `channel` | URL of the signing channel |
//! | `channel_ids` | list of signing channel ids |
//! | `claim_type` | `stream`, `channel`, `collection` or `repost` |
//! | `is_controlling` | only controlling claims |
//! | integer fields | exact value, or `<`, `<=`, `>`, `>=` prefixed string |
//! | `order_by` | field list, `^` prefix for ascending |
//! | `limit`, `offset` | paging; limit defaults to 10, at most 50 |
//! | `no_totals` | skip counting the full result set |

use std::cmp::Ordering;

use hub_01_codec::ClaimKind;
use hub_02_storage::ClaimRecord;
use serde_json::{Map, Value};
use shared_types::{hex_str_to_hash, normalize_name, ClaimHash, Outpoint};

use super::errors::QueryError;

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntField {
    /// Height of the latest update.
    Height,
    CreationHeight,
    ActivationHeight,
    ExpirationHeight,
    Amount,
    EffectiveAmount,
    SupportAmount,
    TrendingAmount,
    TxPosition,
}

impl IntField {
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "height" => Self::Height,
            "creation_height" => Self::CreationHeight,
            "activation_height" => Self::ActivationHeight,
            "expiration_height" => Self::ExpirationHeight,
            "amount" => Self::Amount,
            "effective_amount" => Self::EffectiveAmount,
            "support_amount" => Self::SupportAmount,
            "trending_amount" => Self::TrendingAmount,
            "tx_position" => Self::TxPosition,
            _ => return None,
        })
    }

    /// The field's value on `claim`; an unset activation height reads as -1.
    pub fn value(self, claim: &ClaimRecord) -> i64 {
        match self {
            Self::Height => i64::from(claim.update_height),
            Self::CreationHeight => i64::from(claim.height),
            Self::ActivationHeight => claim.activation_height.map_or(-1, i64::from),
            Self::ExpirationHeight => i64::from(claim.expiration_height),
            Self::Amount => claim.amount as i64,
            Self::EffectiveAmount => claim.effective_amount as i64,
            Self::SupportAmount => claim.support_amount as i64,
            Self::TrendingAmount => claim.trending_amount as i64,
            Self::TxPosition => i64::from(claim.tx_position),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntConstraint {
    pub field: IntField,
    pub comparison: Comparison,
    pub value: i64,
}

impl IntConstraint {
    fn parse(key: &str, field: IntField, value: &Value) -> Result<Self, QueryError> {
        let (comparison, number) = match value {
            Value::Number(n) => (
                Comparison::Eq,
                n.as_i64().ok_or_else(|| QueryError::invalid(key, "not an integer"))?,
            ),
            Value::String(s) => {
                let (comparison, rest) = if let Some(rest) = s.strip_prefix("<=") {
                    (Comparison::Le, rest)
                } else if let Some(rest) = s.strip_prefix(">=") {
                    (Comparison::Ge, rest)
                } else if let Some(rest) = s.strip_prefix('<') {
                    (Comparison::Lt, rest)
                } else if let Some(rest) = s.strip_prefix('>') {
                    (Comparison::Gt, rest)
                } else {
                    (Comparison::Eq, s.as_str())
                };
                let number = rest
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| QueryError::invalid(key, format!("\"{s}\" is not an integer")))?;
                (comparison, number)
            }
            _ => return Err(QueryError::invalid(key, "expected an integer or string")),
        };
        Ok(Self {
            field,
            comparison,
            value: number,
        })
    }

    pub fn matches(&self, claim: &ClaimRecord) -> bool {
        let actual = self.field.value(claim);
        match self.comparison {
            Comparison::Eq => actual == self.value,
            Comparison::Lt => actual < self.value,
            Comparison::Le => actual <= self.value,
            Comparison::Gt => actual > self.value,
            Comparison::Ge => actual >= self.value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Name,
    ClaimHash,
    Int(IntField),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: OrderField,
    pub ascending: bool,
}

impl OrderBy {
    pub const fn asc(field: OrderField) -> Self {
        Self {
            field,
            ascending: true,
        }
    }

    pub const fn desc(field: OrderField) -> Self {
        Self {
            field,
            ascending: false,
        }
    }

    fn parse(raw: &str) -> Result<Self, QueryError> {
        let (ascending, column) = match raw.strip_prefix('^') {
            Some(column) => (true, column),
            None => (false, raw),
        };
        let field = match column {
            "name" => OrderField::Name,
            "claim_hash" => OrderField::ClaimHash,
            other => OrderField::Int(IntField::from_key(other).ok_or_else(|| {
                QueryError::invalid("order_by", format!("{other} is not a valid order_by field"))
            })?),
        };
        Ok(Self { field, ascending })
    }

    pub fn compare(&self, a: &ClaimRecord, b: &ClaimRecord) -> Ordering {
        let ordering = match self.field {
            OrderField::Name => a.name.cmp(&b.name),
            OrderField::ClaimHash => a.claim_hash.cmp(&b.claim_hash),
            OrderField::Int(field) => field.value(a).cmp(&field.value(b)),
        };
        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

/// Validated search parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConstraints {
    /// Normalized.
    pub name: Option<String>,
    pub text: Option<String>,
    /// Lowercase hex; a prefix when shorter than 40 characters.
    pub claim_id: Option<String>,
    pub claim_ids: Vec<ClaimHash>,
    pub outpoint: Option<Outpoint>,
    /// URL of the signing channel, resolved at query time.
    pub channel: Option<String>,
    pub channel_ids: Vec<ClaimHash>,
    pub claim_type: Option<ClaimKind>,
    pub is_controlling: bool,
    pub ints: Vec<IntConstraint>,
    pub order_by: Vec<OrderBy>,
    pub limit: usize,
    pub offset: usize,
    pub no_totals: bool,
}

impl Default for SearchConstraints {
    fn default() -> Self {
        Self {
            name: None,
            text: None,
            claim_id: None,
            claim_ids: Vec::new(),
            outpoint: None,
            channel: None,
            channel_ids: Vec::new(),
            claim_type: None,
            is_controlling: false,
            ints: Vec::new(),
            order_by: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            no_totals: false,
        }
    }
}

fn string(key: &str, value: &Value) -> Result<String, QueryError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| QueryError::invalid(key, "expected a string"))
}

fn strings(key: &str, value: &Value) -> Result<Vec<String>, QueryError> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items.iter().map(|item| string(key, item)).collect(),
        _ => Err(QueryError::invalid(key, "expected a list of strings")),
    }
}

fn boolean(key: &str, value: &Value) -> Result<bool, QueryError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_i64().unwrap_or(0) != 0),
        _ => Err(QueryError::invalid(key, "expected a boolean")),
    }
}

fn count(key: &str, value: &Value) -> Result<usize, QueryError> {
    let n = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| QueryError::invalid(key, "expected an integer"))?;
    Ok(n.unsigned_abs() as usize)
}

fn claim_hash(key: &str, id: &str) -> Result<ClaimHash, QueryError> {
    ClaimHash::from_claim_id(id).map_err(|e| QueryError::invalid(key, e.to_string()))
}

impl SearchConstraints {
    pub fn from_params(params: &Map<String, Value>) -> Result<Self, QueryError> {
        let mut constraints = Self::default();
        let mut txid = None;
        let mut nout = 0u32;
        for (key, value) in params {
            match key.as_str() {
                "name" => constraints.name = Some(normalize_name(&string(key, value)?)),
                "text" => constraints.text = Some(string(key, value)?),
                "claim_id" => {
                    let id = string(key, value)?.to_ascii_lowercase();
                    if id.is_empty() || id.len() > 40 || !id.chars().all(|c| c.is_ascii_hexdigit()) {
                        return Err(QueryError::invalid(key, "not a claim id"));
                    }
                    constraints.claim_id = Some(id);
                }
                "claim_ids" => {
                    constraints.claim_ids = strings(key, value)?
                        .iter()
                        .map(|id| claim_hash(key, id))
                        .collect::<Result<_, _>>()?;
                }
                "txid" => {
                    let hex = string(key, value)?;
                    txid = Some(
                        hex_str_to_hash(&hex).map_err(|e| QueryError::invalid(key, e.to_string()))?,
                    );
                }
                "nout" => {
                    nout = u32::try_from(count(key, value)?)
                        .map_err(|_| QueryError::invalid(key, "out of range"))?;
                }
                "channel" => constraints.channel = Some(string(key, value)?),
                "channel_ids" => {
                    constraints.channel_ids = strings(key, value)?
                        .iter()
                        .map(|id| claim_hash(key, id))
                        .collect::<Result<_, _>>()?;
                }
                "claim_type" => {
                    let name = string(key, value)?;
                    constraints.claim_type = Some(
                        ClaimKind::from_name(&name)
                            .ok_or_else(|| QueryError::invalid(key, format!("unknown type {name}")))?,
                    );
                }
                "is_controlling" => constraints.is_controlling = boolean(key, value)?,
                "order_by" => {
                    constraints.order_by = strings(key, value)?
                        .iter()
                        .map(|raw| OrderBy::parse(raw))
                        .collect::<Result<_, _>>()?;
                }
                "limit" => constraints.limit = count(key, value)?.min(MAX_LIMIT),
                "offset" => constraints.offset = count(key, value)?,
                "no_totals" => constraints.no_totals = boolean(key, value)?,
                other => match IntField::from_key(other) {
                    Some(field) => constraints.ints.push(IntConstraint::parse(key, field, value)?),
                    None => return Err(QueryError::UnknownConstraint(other.to_string())),
                },
            }
        }
        if let Some(tx_hash) = txid {
            constraints.outpoint = Some(Outpoint::new(tx_hash, nout));
        }
        Ok(constraints)
    }

    /// Whether `claim` passes every per-claim filter. Name, channel URL and
    /// text are applied by candidate selection.
    pub fn matches(&self, claim: &ClaimRecord, controlling: bool) -> bool {
        if self.is_controlling && !controlling {
            return false;
        }
        if let Some(name) = &self.name {
            if &claim.name != name {
                return false;
            }
        }
        if let Some(prefix) = &self.claim_id {
            if !claim.claim_id().starts_with(prefix.as_str()) {
                return false;
            }
        }
        if !self.claim_ids.is_empty() && !self.claim_ids.contains(&claim.claim_hash) {
            return false;
        }
        if let Some(outpoint) = &self.outpoint {
            if &claim.outpoint != outpoint {
                return false;
            }
        }
        if !self.channel_ids.is_empty()
            && !claim
                .channel_hash
                .is_some_and(|channel| self.channel_ids.contains(&channel))
        {
            return false;
        }
        if let Some(kind) = self.claim_type {
            if claim.kind != kind {
                return false;
            }
        }
        self.ints.iter().all(|constraint| constraint.matches(claim))
    }
}
