//! Builds tracking events and hands them to the outgoing queue.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};

use barebone_protocols::{EventPayload, ProductId, TrackingEvent};

use crate::context::TrackerContext;
use crate::identity::IdentityProvider;
use crate::queue::EventQueue;

/// Formats events and enqueues them. Never blocks or fails.
pub struct EventEmitter {
    context: Arc<TrackerContext>,
    identity: Arc<IdentityProvider>,
    queue: EventQueue,
}

impl EventEmitter {
    pub fn new(
        context: Arc<TrackerContext>,
        identity: Arc<IdentityProvider>,
        queue: EventQueue,
    ) -> Self {
        Self {
            context,
            identity,
            queue,
        }
    }

    /// Build and enqueue one event.
    ///
    /// Returns whether the event was queued. A closed queue drops the event
    /// with a warning.
    pub fn emit(&self, payload: EventPayload) -> bool {
        let event = TrackingEvent {
            client_id: self.context.client_id.clone(),
            user_id: self.identity.get_user_id(),
            payload,
            environment: self.context.environment.clone(),
            timestamp: now_iso8601(),
        };
        let event_type = event.event_type();

        match self.queue.push(event) {
            Ok(()) => {
                debug!("Queued {} event", event_type);
                true
            }
            Err(e) => {
                warn!("Dropping {} event: {}", event_type, e);
                false
            }
        }
    }

    pub fn emit_impression(&self, product_ids: Vec<ProductId>) -> bool {
        self.emit(EventPayload::Impression { product_ids })
    }

    pub fn emit_click(&self, product_id: ProductId) -> bool {
        self.emit(EventPayload::Click { product_id })
    }
}

/// Current UTC time as `2024-01-01T12:00:00.000Z`.
fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
