//! Driving port: how ingestion tells the session layer something changed.

use std::collections::BTreeSet;

use async_trait::async_trait;
use shared_types::{HashX, Height};

#[async_trait]
pub trait SessionNotifier: Send + Sync {
    /// Push notifications for a chain at `height` where the confirmed or
    /// unconfirmed state of `touched` changed. Header subscribers hear
    /// only about heights they have not seen.
    async fn notify(&self, height: Height, touched: &BTreeSet<HashX>);
}
