pub mod config;
pub mod errors;
pub mod groups;
pub mod protocol;
pub mod status;
pub mod version;

pub use config::{ClientFilter, SessionConfig};
pub use errors::{codes, RpcError, SessionError};
pub use groups::{GroupAssigner, SessionGroup};
pub use protocol::{Incoming, Params, Request};
pub use version::{negotiate, protocol_max, protocol_min, ProtocolVersion};
