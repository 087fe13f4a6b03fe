//! # In-Memory Search Index
//!
//! An inverted index ranked with Okapi BM25:
//!
//! ```text
//! score(D, Q) = Σ idf(t) · tf(t, D) · (k1 + 1) / (tf(t, D) + k1 · (1 − b + b · |D| / avgdl))
//! idf(t)      = ln((N − n(t) + 0.5) / (n(t) + 0.5) + 1)
//! ```
//!
//! Tokens are lowercase alphanumeric runs. A document matches when it
//! contains at least one query token.

use std::collections::HashMap;

use parking_lot::RwLock;
use shared_types::ClaimHash;

use crate::ports::{ClaimDocument, SearchIndex};

const K1: f64 = 1.2;
const B: f64 = 0.75;

pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

#[derive(Default)]
struct Inner {
    /// Token count of each document.
    lengths: HashMap<ClaimHash, usize>,
    /// Token to term frequency per document.
    postings: HashMap<String, HashMap<ClaimHash, u32>>,
    total_length: usize,
}

impl Inner {
    fn remove(&mut self, claim_hash: &ClaimHash) {
        let Some(length) = self.lengths.remove(claim_hash) else {
            return;
        };
        self.total_length -= length;
        self.postings.retain(|_, docs| {
            docs.remove(claim_hash);
            !docs.is_empty()
        });
    }
}

#[derive(Default)]
pub struct MemorySearchIndex {
    inner: RwLock<Inner>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SearchIndex for MemorySearchIndex {
    fn upsert(&self, document: ClaimDocument) {
        let mut inner = self.inner.write();
        inner.remove(&document.claim_hash);
        let mut length = 0;
        for token in tokenize(&document.text) {
            length += 1;
            *inner
                .postings
                .entry(token)
                .or_default()
                .entry(document.claim_hash)
                .or_default() += 1;
        }
        inner.lengths.insert(document.claim_hash, length);
        inner.total_length += length;
    }

    fn remove(&self, claim_hash: &ClaimHash) {
        self.inner.write().remove(claim_hash);
    }

    fn search(&self, query: &str) -> Vec<(ClaimHash, f64)> {
        let inner = self.inner.read();
        let docs = inner.lengths.len();
        if docs == 0 {
            return Vec::new();
        }
        let avgdl = (inner.total_length as f64 / docs as f64).max(1.0);
        let mut scores: HashMap<ClaimHash, f64> = HashMap::new();
        let mut seen = Vec::new();
        for token in tokenize(query) {
            if seen.contains(&token) {
                continue;
            }
            let Some(postings) = inner.postings.get(&token) else {
                seen.push(token);
                continue;
            };
            let n = postings.len() as f64;
            let idf = ((docs as f64 - n + 0.5) / (n + 0.5) + 1.0).ln();
            for (claim_hash, tf) in postings {
                let tf = f64::from(*tf);
                let length = inner.lengths.get(claim_hash).copied().unwrap_or(0) as f64;
                let norm = K1 * (1.0 - B + B * length / avgdl);
                *scores.entry(*claim_hash).or_default() += idf * tf * (K1 + 1.0) / (tf + norm);
            }
            seen.push(token);
        }
        let mut ranked: Vec<(ClaimHash, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    fn len(&self) -> usize {
        self.inner.read().lengths.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(seed: u8, text: &str) -> ClaimDocument {
        ClaimDocument {
            claim_hash: ClaimHash([seed; 20]),
            text: text.into(),
        }
    }

    #[test]
    fn test_tokenize() {
        let tokens: Vec<_> = tokenize("Hello, World! rust-lang_2024").collect();
        assert_eq!(tokens, vec!["hello", "world", "rust", "lang", "2024"]);
    }

    #[test]
    fn test_ranks_by_term_frequency_and_rarity() {
        let index = MemorySearchIndex::new();
        index.upsert(doc(1, "cats and dogs"));
        index.upsert(doc(2, "cats cats cats"));
        index.upsert(doc(3, "birds"));
        let hits = index.search("cats");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, ClaimHash([2; 20]));

        // A rare term outweighs a common one.
        let hits = index.search("cats birds");
        assert_eq!(hits[0].0, ClaimHash([3; 20]));
    }

    #[test]
    fn test_upsert_replaces_and_remove_forgets() {
        let index = MemorySearchIndex::new();
        index.upsert(doc(1, "old title"));
        index.upsert(doc(1, "new title"));
        assert_eq!(index.len(), 1);
        assert!(index.search("old").is_empty());
        assert_eq!(index.search("new").len(), 1);

        index.remove(&ClaimHash([1; 20]));
        assert!(index.is_empty());
        assert!(index.search("title").is_empty());
    }
}
