pub mod inbound;

pub use inbound::SessionNotifier;
