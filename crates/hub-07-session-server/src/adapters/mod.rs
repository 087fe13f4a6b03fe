pub mod tcp;

pub use tcp::{listen, serve};
