//! # Barebone Protocols
//!
//! Interface definitions shared by the Barebone Analytics crates.
//! Contains only traits and plain data types - no implementations.
//!
//! ## Core Traits
//!
//! - [`HostDocument`] - The UI tree the tracker observes
//! - [`VisibilityObserver`] - Threshold-crossing observer created by the host
//! - [`EventSink`] - Destination for outgoing tracking events
//! - [`KeyValueStore`] - Durable storage for the user identifier

pub mod document;
pub mod error;
pub mod event;
pub mod sink;
pub mod storage;
pub mod subscription;

pub use document::{
    same_listener, ClickEvent, ClickListener, ElementId, HostDocument, MutationHandler,
    MutationRecord, QueryScope, VisibilityEntry, VisibilityHandler, VisibilityObserver,
};
pub use error::{StorageError, TrackerError, TransportError};
pub use event::{EventPayload, EventType, ProductId, TrackingEvent};
pub use sink::EventSink;
pub use storage::KeyValueStore;
pub use subscription::Subscription;
