//! Outgoing event queue and the delivery loop.
//!
//! The engine only ever enqueues. A delivery task owns the [`EventStream`]
//! and awaits the sink one event at a time; failures are logged and the
//! event is dropped.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use barebone_protocols::{EventSink, TrackingEvent, TransportError};

/// Sending half of the outgoing queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<TrackingEvent>,
}

/// Receiving half of the outgoing queue.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<TrackingEvent>,
}

impl EventQueue {
    /// Create a connected queue and stream.
    pub fn channel() -> (EventQueue, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventQueue { tx }, EventStream { rx })
    }

    /// Enqueue without waiting. Fails only when the stream was dropped.
    pub fn push(&self, event: TrackingEvent) -> Result<(), TransportError> {
        self.tx.send(event).map_err(|_| TransportError::QueueClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl EventStream {
    /// Next event, or `None` once every [`EventQueue`] handle is gone.
    pub async fn next(&mut self) -> Option<TrackingEvent> {
        self.rx.recv().await
    }

    /// Next event if one is ready.
    pub fn try_next(&mut self) -> Option<TrackingEvent> {
        self.rx.try_recv().ok()
    }

    /// All events that are ready right now.
    pub fn drain_ready(&mut self) -> Vec<TrackingEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next() {
            events.push(event);
        }
        events
    }
}

/// Outcome of a finished delivery loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub sent: usize,
    pub failed: usize,
}

impl DeliveryStats {
    pub fn total(&self) -> usize {
        self.sent + self.failed
    }
}

/// Send every queued event through `sink` until the queue closes.
///
/// Events are sent in order, one at a time. Nothing is retried.
pub async fn deliver(mut stream: EventStream, sink: Arc<dyn EventSink>) -> DeliveryStats {
    let mut stats = DeliveryStats::default();
    debug!("Delivery started on sink '{}'", sink.name());

    while let Some(event) = stream.next().await {
        match sink.send(&event).await {
            Ok(()) => {
                stats.sent += 1;
                debug!("Delivered {} event via '{}'", event.event_type(), sink.name());
            }
            Err(e) => {
                stats.failed += 1;
                error!(
                    "Failed to deliver {} event via '{}': {}",
                    event.event_type(),
                    sink.name(),
                    e
                );
            }
        }
    }

    info!(
        "Delivery finished on sink '{}': {} sent, {} failed",
        sink.name(),
        stats.sent,
        stats.failed
    );
    stats
}
