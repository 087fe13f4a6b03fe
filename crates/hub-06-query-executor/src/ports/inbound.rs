use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::errors::QueryError;

/// Claim queries as the session layer sees them. Results are base64
/// encoded [`Outputs`](crate::domain::outputs::Outputs).
#[async_trait]
pub trait QueryApi: Send + Sync {
    async fn resolve(&self, urls: Vec<String>) -> Result<Arc<str>, QueryError>;

    async fn search(&self, params: Map<String, Value>) -> Result<Arc<str>, QueryError>;
}
