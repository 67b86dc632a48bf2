//! Shared error helpers and filesystem guards used across all skillport crates.

pub mod error;
pub mod fs;
pub mod paths;

pub use error::{Error, FromMessage, Result};
