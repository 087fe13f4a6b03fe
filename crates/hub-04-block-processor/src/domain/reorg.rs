//! Common-ancestor search helpers.

use shared_types::{BlockHash, Height};

/// Index of the first position where the two hash lists differ, or the
/// length of the shorter list when they agree.
pub fn first_difference(local: &[BlockHash], remote: &[BlockHash]) -> usize {
    local
        .iter()
        .zip(remote)
        .position(|(a, b)| a != b)
        .unwrap_or_else(|| local.len().min(remote.len()))
}

/// The next window to compare while walking back from a mismatch.
///
/// Windows start one block below the tip and double in size, so a reorg of
/// depth `d` costs `O(log d)` round trips to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AncestorWindow {
    pub start: Height,
    pub count: u32,
}

impl AncestorWindow {
    /// First window for a tip at `tip`; `None` when there is nothing below it.
    pub fn first(tip: Height) -> Option<Self> {
        (tip > 0).then(|| Self {
            start: tip - 1,
            count: 1,
        })
    }

    /// The window below this one, twice as wide, clipped at genesis.
    pub fn widen(self) -> Option<Self> {
        if self.start == 0 {
            return None;
        }
        let count = (self.count * 2).min(self.start);
        Some(Self {
            start: self.start - count,
            count,
        })
    }
}
