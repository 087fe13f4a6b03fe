//! # Domain Layer
//!
//! - `keys` - the key schema shared by every table
//! - `entities` - stored rows
//! - `errors` - storage and lock errors

pub mod entities;
pub mod errors;
pub mod keys;
