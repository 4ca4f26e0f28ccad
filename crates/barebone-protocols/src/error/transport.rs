//! Transport errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Collector returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Serialization failed: {0}")]
    Serialize(String),

    #[error("Event queue closed")]
    QueueClosed,
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Serialize(err.to_string())
    }
}
