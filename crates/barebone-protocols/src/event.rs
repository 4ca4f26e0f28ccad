//! Tracking event wire format.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Product identifier read from the marker attribute.
///
/// `None` when the attribute is absent. Absent identifiers are still
/// transmitted, as JSON `null`.
pub type ProductId = Option<String>;

/// Kind of tracking event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Impression,
    Click,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Impression => write!(f, "impression"),
            EventType::Click => write!(f, "click"),
        }
    }
}

/// Event-specific part of a [`TrackingEvent`].
///
/// Impressions carry a list under `productIds`; clicks carry a scalar under
/// `productId`. The two field names are deliberately different.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "lowercase")]
pub enum EventPayload {
    Impression {
        #[serde(rename = "productIds")]
        product_ids: Vec<ProductId>,
    },
    Click {
        #[serde(rename = "productId")]
        product_id: ProductId,
    },
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::Impression { .. } => EventType::Impression,
            EventPayload::Click { .. } => EventType::Click,
        }
    }
}

/// One outgoing tracking event. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub client_id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub payload: EventPayload,
    pub environment: String,
    /// ISO-8601 UTC timestamp taken when the event was emitted.
    pub timestamp: String,
}

impl TrackingEvent {
    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }
}
