//! Event sink trait.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::event::TrackingEvent;

/// Destination for outgoing tracking events.
///
/// Sinks are best-effort: the delivery loop logs a failed send and moves on.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Sink name, used in log lines.
    fn name(&self) -> &str;

    /// Deliver one event.
    async fn send(&self, event: &TrackingEvent) -> Result<(), TransportError>;
}
