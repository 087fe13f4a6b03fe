//! # Hub Events
//!
//! Every event that flows through the shared bus.

use serde::{Deserialize, Serialize};
use shared_types::{BlockHash, ClaimHash, HashX, Height};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HubEvent {
    // =========================================================================
    // BLOCK PROCESSOR
    // =========================================================================
    /// A block was committed to storage.
    BlockAdvanced {
        /// Height of the committed block.
        height: Height,
        /// Hash of the committed block.
        block_hash: BlockHash,
        /// Script hashes whose confirmed history changed.
        touched_hashxs: Vec<HashX>,
        /// Claims whose stored state changed (including deletions).
        touched_claims: Vec<ClaimHash>,
    },

    /// Blocks above `to_height` were removed during a reorganization.
    ChainRewound {
        /// Tip height before the rewind.
        from_height: Height,
        /// Tip height after the rewind.
        to_height: Height,
        /// Script hashes touched by the removed blocks.
        touched_hashxs: Vec<HashX>,
        /// Claims touched by the removed blocks.
        touched_claims: Vec<ClaimHash>,
    },

    /// The ingestion loop reached the daemon's tip.
    CaughtUp {
        /// Local tip height.
        height: Height,
    },

    // =========================================================================
    // MEMPOOL
    // =========================================================================
    /// The unconfirmed transaction set changed.
    MempoolRefreshed {
        /// Script hashes whose unconfirmed status may have changed.
        touched_hashxs: Vec<HashX>,
    },

    // =========================================================================
    // CRITICAL EVENTS
    // =========================================================================
    /// Unrecoverable condition requiring operator attention.
    CriticalError {
        /// Originating component.
        source: String,
        /// Error description.
        error: String,
    },
}

impl HubEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::BlockAdvanced { .. } | Self::ChainRewound { .. } | Self::CaughtUp { .. } => {
                EventTopic::Chain
            }
            Self::MempoolRefreshed { .. } => EventTopic::Mempool,
            Self::CriticalError { .. } => EventTopic::Critical,
        }
    }

    /// Script hashes touched by this event, if any.
    #[must_use]
    pub fn touched_hashxs(&self) -> &[HashX] {
        match self {
            Self::BlockAdvanced { touched_hashxs, .. }
            | Self::ChainRewound { touched_hashxs, .. }
            | Self::MempoolRefreshed { touched_hashxs } => touched_hashxs,
            Self::CaughtUp { .. } | Self::CriticalError { .. } => &[],
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Confirmed chain changes.
    Chain,
    /// Unconfirmed transaction changes.
    Mempool,
    /// Errors requiring operator attention.
    Critical,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &HubEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}
