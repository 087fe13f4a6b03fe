//! # Shared Bus - Event Bus for Hub Subsystems
//!
//! Carries "something changed" notifications from the ingestion side of the
//! hub (block processor, mempool) to its serving side (session manager,
//! search index).
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────────┐                    ┌─────────────────┐
//! │ BlockProcessor  │                    │ SessionManager  │
//! │ MempoolIndex    │    publish()       │ SearchIndex     │
//! │                 │ ──────┐            │                 │
//! └─────────────────┘       │            └─────────────────┘
//!                           ▼                    ↑
//!                     ┌──────────────┐          │
//!                     │  Event Bus   │          │
//!                     │              │ ─────────┘
//!                     └──────────────┘  subscribe()
//! ```
//!
//! Events are ordered per publisher: a subscriber observes `BlockAdvanced`
//! for height H before the one for H + 1.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, HubEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
