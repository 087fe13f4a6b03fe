pub mod outbound;

pub use outbound::DaemonApi;
