//! # Takeover Ordering
//!
//! The controlling claim is the eligible claim with the highest effective
//! amount. On an exact tie the incumbent keeps control; otherwise the
//! earlier claim wins (creation height, then position in block, then claim
//! hash), which makes the order total.

use std::cmp::Ordering;

use hub_02_storage::ClaimRecord;
use shared_types::ClaimHash;

/// `Less` means `a` ranks ahead of `b`.
pub fn rank(a: &ClaimRecord, b: &ClaimRecord) -> Ordering {
    b.effective_amount
        .cmp(&a.effective_amount)
        .then(a.height.cmp(&b.height))
        .then(a.tx_position.cmp(&b.tx_position))
        .then(a.claim_hash.cmp(&b.claim_hash))
}

/// Choose the controlling claim among `candidates`.
pub fn pick_winner<'a>(
    candidates: &'a [ClaimRecord],
    incumbent: Option<&ClaimHash>,
) -> Option<&'a ClaimRecord> {
    let best = candidates.iter().min_by(|a, b| rank(a, b))?;
    let holder = incumbent.and_then(|hash| candidates.iter().find(|c| &c.claim_hash == hash));
    match holder {
        Some(holder) if holder.effective_amount == best.effective_amount => Some(holder),
        _ => Some(best),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_01_codec::ClaimKind;
    use shared_types::Outpoint;

    fn claim(seed: u8, effective: u64, height: u32) -> ClaimRecord {
        ClaimRecord {
            claim_hash: ClaimHash([seed; 20]),
            name: "n".into(),
            original_name: "n".into(),
            outpoint: Outpoint::new([seed; 32], 0),
            tx_position: 1,
            amount: effective,
            effective_amount: effective,
            support_amount: 0,
            trending_amount: 0,
            height,
            update_height: height,
            activation_height: Some(height),
            expiration_height: height + 100,
            channel_hash: None,
            kind: ClaimKind::Stream,
            value: Vec::new(),
        }
    }

    #[test]
    fn test_highest_effective_amount_wins() {
        let claims = vec![claim(1, 10, 5), claim(2, 50, 9)];
        assert_eq!(pick_winner(&claims, None).unwrap().claim_hash, ClaimHash([2; 20]));
        assert_eq!(
            pick_winner(&claims, Some(&ClaimHash([1; 20]))).unwrap().claim_hash,
            ClaimHash([2; 20])
        );
    }

    #[test]
    fn test_incumbent_keeps_exact_tie() {
        let claims = vec![claim(1, 20, 5), claim(2, 20, 9)];
        assert_eq!(
            pick_winner(&claims, Some(&ClaimHash([2; 20]))).unwrap().claim_hash,
            ClaimHash([2; 20])
        );
    }

    #[test]
    fn test_tie_without_incumbent_prefers_older_then_hash() {
        let claims = vec![claim(3, 20, 9), claim(2, 20, 5), claim(1, 20, 9)];
        assert_eq!(pick_winner(&claims, None).unwrap().claim_hash, ClaimHash([2; 20]));
        let same_height = vec![claim(3, 20, 9), claim(1, 20, 9)];
        assert_eq!(pick_winner(&same_height, None).unwrap().claim_hash, ClaimHash([1; 20]));
    }

    #[test]
    fn test_no_candidates() {
        assert!(pick_winner(&[], Some(&ClaimHash([1; 20]))).is_none());
    }
}
