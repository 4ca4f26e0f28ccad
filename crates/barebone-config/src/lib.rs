//! # Barebone Config
//!
//! Configuration for the tracker: client identity, collector endpoint and
//! observation tuning. Loaded from TOML or from the query string of the
//! embedding script URL.

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
