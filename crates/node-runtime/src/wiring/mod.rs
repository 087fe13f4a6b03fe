//! # Subsystem Wiring
//!
//! The subsystem crates never call each other for notifications. The sync
//! service and the mempool publish [`HubEvent`](shared_bus::HubEvent)s on
//! the bus; the [`NotificationRouter`] subscribes and drives the search
//! index, the query caches and the session layer.

pub mod event_routing;

pub use event_routing::NotificationRouter;
