//! Tracker startup errors.

use thiserror::Error;

use super::{StorageError, TransportError};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Configuration missing: client_id is not set")]
    ConfigurationMissing,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
