//! # Claim Reader
//!
//! Synchronous resolve and search over one consistent view of the claim
//! store. Runs on a query worker; checks its [`Deadline`] between rows.
//!
//! ## Candidate selection
//!
//! The narrowest index available picks the candidates: name, then claim
//! id, outpoint, signing channel, text hits, and finally a full scan. Every
//! other constraint filters the candidates.
//!
//! ## Ordering
//!
//! Explicit `order_by` first, otherwise text relevance, otherwise claim
//! hash descending. Ties always fall back to claim hash ascending so pages
//! are stable.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use hub_01_codec::ClaimKind;
use hub_02_storage::{ClaimRecord, ClaimTrieEntry, ClaimTrieReader};
use shared_types::ClaimHash;

use super::constraints::{IntField, OrderBy, OrderField, SearchConstraints};
use super::deadline::Deadline;
use super::errors::QueryError;
use super::outputs::{ClaimMeta, OutputRow, Outputs, ResolveErrorKind};
use super::url::{ClaimUrl, Modifier, PathSegment};
use crate::ports::SearchIndex;

pub struct ClaimReader<'a, R: ClaimTrieReader + ?Sized> {
    store: &'a R,
    index: &'a dyn SearchIndex,
    deadline: Deadline,
    trie: HashMap<String, Option<ClaimTrieEntry>>,
}

impl<'a, R: ClaimTrieReader + ?Sized> ClaimReader<'a, R> {
    pub fn new(store: &'a R, index: &'a dyn SearchIndex, deadline: Deadline) -> Self {
        Self {
            store,
            index,
            deadline,
            trie: HashMap::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------------

    pub fn search(&mut self, constraints: &SearchConstraints) -> Result<Outputs, QueryError> {
        let (hits, total) = self.find(constraints)?;
        let rows = hits
            .into_iter()
            .map(|claim| self.meta(claim))
            .collect::<Result<Vec<_>, _>>()?;
        let extra_txos = self.referenced(&rows)?;
        Ok(Outputs {
            txos: rows.into_iter().map(OutputRow::Claim).collect(),
            extra_txos,
            offset: constraints.offset as u32,
            total: (!constraints.no_totals).then_some(total as u64),
        })
    }

    /// Matching claims after paging, and the match count before it.
    fn find(&mut self, c: &SearchConstraints) -> Result<(Vec<ClaimRecord>, usize), QueryError> {
        let channel_hash = match &c.channel {
            Some(url) => match self.resolve_raw(url)? {
                Ok(channel) => Some(channel.claim_hash),
                Err(_) => return Ok((Vec::new(), 0)),
            },
            None => None,
        };
        let scores: Option<HashMap<ClaimHash, f64>> = c
            .text
            .as_deref()
            .map(|text| self.index.search(text).into_iter().collect());

        let candidates = if let Some(name) = &c.name {
            self.store.get_claims_by_name(name)?
        } else if let Some(hash) = c
            .claim_id
            .as_deref()
            .filter(|id| id.len() == 40)
            .and_then(|id| ClaimHash::from_claim_id(id).ok())
        {
            self.claims([hash])?
        } else if !c.claim_ids.is_empty() {
            self.claims(c.claim_ids.iter().copied())?
        } else if let Some(outpoint) = &c.outpoint {
            let hash = self.store.claim_hash_at_outpoint(outpoint)?;
            self.claims(hash)?
        } else if let Some(channel) = &channel_hash {
            let members = self.store.claims_in_channel(channel)?;
            self.claims(members)?
        } else if let Some(scores) = &scores {
            let hashes: Vec<ClaimHash> = scores.keys().copied().collect();
            self.claims(hashes)?
        } else {
            self.store.all_claims()?
        };

        let mut matched = Vec::new();
        for claim in candidates {
            self.deadline.check()?;
            if channel_hash.is_some() && claim.channel_hash != channel_hash {
                continue;
            }
            if let Some(scores) = &scores {
                if !scores.contains_key(&claim.claim_hash) {
                    continue;
                }
            }
            let controlling = self.is_controlling(&claim)?;
            if c.matches(&claim, controlling) {
                matched.push(claim);
            }
        }

        matched.sort_by(|a, b| {
            let primary = if !c.order_by.is_empty() {
                c.order_by
                    .iter()
                    .map(|order| order.compare(a, b))
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(Ordering::Equal)
            } else if let Some(scores) = &scores {
                let score = |claim: &ClaimRecord| scores.get(&claim.claim_hash).copied().unwrap_or(0.0);
                score(b).total_cmp(&score(a))
            } else {
                OrderBy::desc(OrderField::ClaimHash).compare(a, b)
            };
            primary.then_with(|| a.claim_hash.cmp(&b.claim_hash))
        });

        let total = matched.len();
        let page = matched.into_iter().skip(c.offset).take(c.limit).collect();
        Ok((page, total))
    }

    fn claims(
        &self,
        hashes: impl IntoIterator<Item = ClaimHash>,
    ) -> Result<Vec<ClaimRecord>, QueryError> {
        let mut claims = Vec::new();
        for hash in hashes {
            self.deadline.check()?;
            if let Some(claim) = self.store.get_claim(&hash)? {
                claims.push(claim);
            }
        }
        Ok(claims)
    }

    // -------------------------------------------------------------------------
    // Resolve
    // -------------------------------------------------------------------------

    pub fn resolve(&mut self, urls: &[String]) -> Result<Outputs, QueryError> {
        let mut txos = Vec::with_capacity(urls.len());
        let mut found = Vec::new();
        for raw in urls {
            self.deadline.check()?;
            let row = match ClaimUrl::parse(raw) {
                Err(err) => OutputRow::Error {
                    kind: ResolveErrorKind::InvalidUrl,
                    message: err.to_string(),
                },
                Ok(url) => match self.resolve_url(&url, raw)? {
                    Ok(claim) => {
                        let meta = self.meta(claim)?;
                        found.push(meta.clone());
                        OutputRow::Claim(meta)
                    }
                    Err(message) => OutputRow::Error {
                        kind: ResolveErrorKind::NotFound,
                        message,
                    },
                },
            };
            txos.push(row);
        }
        let extra_txos = self.referenced(&found)?;
        Ok(Outputs {
            txos,
            extra_txos,
            offset: 0,
            total: None,
        })
    }

    fn resolve_raw(&mut self, raw: &str) -> Result<Result<ClaimRecord, String>, QueryError> {
        match ClaimUrl::parse(raw) {
            Ok(url) => self.resolve_url(&url, raw),
            Err(err) => Ok(Err(err.to_string())),
        }
    }

    /// The claim a URL names, or the message explaining why there is none.
    fn resolve_url(
        &mut self,
        url: &ClaimUrl,
        raw: &str,
    ) -> Result<Result<ClaimRecord, String>, QueryError> {
        let channel = match &url.channel {
            Some(segment) => match self.resolve_segment(segment, None)? {
                Some(channel) => Some(channel),
                None => return Ok(Err(format!("Could not find channel in \"{raw}\"."))),
            },
            None => None,
        };
        match &url.stream {
            Some(segment) => Ok(self
                .resolve_segment(segment, channel.as_ref())?
                .ok_or_else(|| format!("Could not find stream in \"{raw}\"."))),
            None => Ok(channel.ok_or_else(|| format!("Could not resolve \"{raw}\"."))),
        }
    }

    fn resolve_segment(
        &mut self,
        segment: &PathSegment,
        channel: Option<&ClaimRecord>,
    ) -> Result<Option<ClaimRecord>, QueryError> {
        let name = segment.normalized();
        let mut candidates = self.store.get_claims_by_name(&name)?;
        if let Some(channel) = channel {
            candidates.retain(|claim| claim.channel_hash == Some(channel.claim_hash));
        }
        self.deadline.check()?;

        let by = |order: OrderBy| {
            move |a: &ClaimRecord, b: &ClaimRecord| {
                order.compare(a, b).then_with(|| a.claim_hash.cmp(&b.claim_hash))
            }
        };
        match &segment.modifier {
            None if channel.is_some() => {
                // Best-supported claim of that name within the channel.
                candidates.sort_by(|a, b| {
                    OrderBy::desc(OrderField::Int(IntField::EffectiveAmount))
                        .compare(a, b)
                        .then_with(|| OrderBy::asc(OrderField::Int(IntField::Height)).compare(a, b))
                        .then_with(|| a.claim_hash.cmp(&b.claim_hash))
                });
                Ok(candidates.into_iter().next())
            }
            None => {
                let Some(entry) = self.trie_entry(&name)? else {
                    return Ok(None);
                };
                Ok(candidates
                    .into_iter()
                    .find(|claim| claim.claim_hash == entry.claim_hash))
            }
            Some(Modifier::ClaimId(prefix)) => {
                candidates.retain(|claim| claim.claim_id().starts_with(prefix.as_str()));
                candidates.sort_by(by(OrderBy::asc(OrderField::Int(IntField::CreationHeight))));
                Ok(candidates.into_iter().next())
            }
            Some(Modifier::Sequence(n)) => {
                candidates.sort_by(by(OrderBy::asc(OrderField::Int(IntField::ActivationHeight))));
                Ok(candidates.into_iter().nth(*n as usize - 1))
            }
            Some(Modifier::AmountOrder(n)) => {
                candidates.sort_by(by(OrderBy::desc(OrderField::Int(IntField::EffectiveAmount))));
                Ok(candidates.into_iter().nth(*n as usize - 1))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Rows
    // -------------------------------------------------------------------------

    fn trie_entry(&mut self, name: &str) -> Result<Option<ClaimTrieEntry>, QueryError> {
        if let Some(entry) = self.trie.get(name) {
            return Ok(entry.clone());
        }
        let entry = self.store.get_trie_entry(name)?;
        self.trie.insert(name.to_string(), entry.clone());
        Ok(entry)
    }

    fn is_controlling(&mut self, claim: &ClaimRecord) -> Result<bool, QueryError> {
        Ok(self
            .trie_entry(&claim.name)?
            .is_some_and(|entry| entry.claim_hash == claim.claim_hash))
    }

    fn meta(&mut self, claim: ClaimRecord) -> Result<ClaimMeta, QueryError> {
        let entry = self.trie_entry(&claim.name)?;
        let is_controlling = entry
            .as_ref()
            .is_some_and(|entry| entry.claim_hash == claim.claim_hash);
        let claims_in_channel = match claim.kind {
            ClaimKind::Channel => Some(self.store.claims_in_channel(&claim.claim_hash)?.len() as u64),
            _ => None,
        };
        let short_url = self.short_url(&claim)?;
        Ok(ClaimMeta {
            claim_hash: claim.claim_hash,
            normalized_name: claim.name,
            name: claim.original_name,
            outpoint: claim.outpoint,
            tx_position: claim.tx_position,
            height: claim.update_height,
            creation_height: claim.height,
            activation_height: claim.activation_height,
            expiration_height: claim.expiration_height,
            amount: claim.amount,
            effective_amount: claim.effective_amount,
            support_amount: claim.support_amount,
            trending_amount: claim.trending_amount,
            is_controlling,
            last_take_over_height: entry.map(|entry| entry.last_take_over_height),
            channel_hash: claim.channel_hash,
            claims_in_channel,
            kind: claim.kind,
            short_url,
            value: claim.value,
        })
    }

    /// `lbry://name#prefix` with the shortest claim id prefix no other
    /// claim of the same name shares.
    fn short_url(&self, claim: &ClaimRecord) -> Result<String, QueryError> {
        let id = claim.claim_id();
        let others: Vec<String> = self
            .store
            .claim_hashes_by_name(&claim.name)?
            .into_iter()
            .filter(|hash| *hash != claim.claim_hash)
            .map(|hash| hash.claim_id())
            .collect();
        let length = (1..=id.len())
            .find(|&n| others.iter().all(|other| !other.starts_with(&id[..n])))
            .unwrap_or(id.len());
        Ok(format!("lbry://{}#{}", claim.original_name, &id[..length]))
    }

    /// Channels that signed any of `rows`, in first-seen order.
    fn referenced(&mut self, rows: &[ClaimMeta]) -> Result<Vec<ClaimMeta>, QueryError> {
        let mut seen = HashSet::new();
        let channels: Vec<ClaimHash> = rows
            .iter()
            .filter_map(|row| row.channel_hash)
            .filter(|hash| seen.insert(*hash))
            .collect();
        let mut extra = Vec::with_capacity(channels.len());
        for claim in self.claims(channels)? {
            extra.push(self.meta(claim)?);
        }
        Ok(extra)
    }
}
