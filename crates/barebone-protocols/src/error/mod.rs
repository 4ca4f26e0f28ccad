//! Error types for the Barebone protocol layer.

mod storage;
mod tracker;
mod transport;

pub use storage::*;
pub use tracker::*;
pub use transport::*;
