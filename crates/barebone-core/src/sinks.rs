//! In-process event sinks.
//!
//! The HTTP sink lives in its own extension crate.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use barebone_protocols::{EventSink, TrackingEvent, TransportError};

/// Writes each event as a JSON log line. Used for dry runs.
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, event: &TrackingEvent) -> Result<(), TransportError> {
        let body = serde_json::to_string(event)?;
        info!(event_type = %event.event_type(), "{}", body);
        Ok(())
    }
}

/// Records delivered events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TrackingEvent>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every event.
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Snapshot of the recorded events, in delivery order.
    pub fn events(&self) -> Vec<TrackingEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send(&self, event: &TrackingEvent) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::RequestFailed("memory sink rejects events".to_string()));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}
