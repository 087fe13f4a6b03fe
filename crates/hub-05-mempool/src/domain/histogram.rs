//! Compact fee histogram for `mempool.get_fee_histogram`.

use std::collections::BTreeMap;

/// Default size of the first bin, in virtual bytes.
pub const DEFAULT_BIN_SIZE: u64 = 100_000;

/// Group `(fee rate, size)` pairs into `(fee rate, cumulative size)` bins,
/// highest rate first.
///
/// Each bin closes once it holds roughly `bin_size` bytes; the target grows
/// by 10% per bin so the tail of cheap transactions stays short. Entries
/// below the last closed bin are omitted.
pub fn compact_fee_histogram(
    rates: impl IntoIterator<Item = (u64, u64)>,
    bin_size: u64,
) -> Vec<(u64, u64)> {
    let mut by_rate: BTreeMap<u64, u64> = BTreeMap::new();
    for (rate, size) in rates {
        *by_rate.entry(rate).or_default() += size;
    }

    let mut compact = Vec::new();
    let mut target = bin_size as f64;
    let mut cumulative = 0u64;
    let mut overshoot = 0f64;
    for (rate, size) in by_rate.into_iter().rev() {
        cumulative += size;
        if cumulative as f64 + overshoot > target {
            compact.push((rate, cumulative));
            overshoot += cumulative as f64 - target;
            cumulative = 0;
            target *= 1.1;
        }
    }
    compact
}
