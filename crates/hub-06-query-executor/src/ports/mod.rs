pub mod inbound;
pub mod outbound;

pub use inbound::QueryApi;
pub use outbound::{ClaimDocument, SearchIndex};
