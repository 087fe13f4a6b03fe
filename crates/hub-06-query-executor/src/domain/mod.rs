pub mod cache;
pub mod constraints;
pub mod deadline;
pub mod errors;
pub mod outputs;
pub mod reader;
pub mod url;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use cache::ResultCache;
pub use constraints::{Comparison, IntConstraint, IntField, OrderBy, OrderField, SearchConstraints};
pub use deadline::Deadline;
pub use errors::{QueryError, UrlError};
pub use outputs::{ClaimMeta, OutputRow, Outputs, ResolveErrorKind};
pub use reader::ClaimReader;
pub use url::{ClaimUrl, Modifier, PathSegment};
