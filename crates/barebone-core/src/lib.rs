//! # Barebone Core
//!
//! Element-lifecycle observation and event deduplication.
//!
//! ## Components
//!
//! - [`TreeWatcher`] - orchestrates registration as the host tree mutates
//! - [`LifecycleRegistry`] - element to registration-handle map
//! - [`VisibilityTracker`] - one impression per product per session
//! - [`InteractionTracker`] - one exact click listener per element
//! - [`EventEmitter`] - builds [`TrackingEvent`]s onto the [`EventQueue`]
//! - [`IdentityProvider`] - stable per-profile user identifier
//!
//! [`Tracker`] wires them together from a [`TrackerConfig`].
//!
//! [`TrackingEvent`]: barebone_protocols::TrackingEvent
//! [`TrackerConfig`]: barebone_config::TrackerConfig

pub mod context;
pub mod emitter;
pub mod identity;
pub mod interaction;
pub mod queue;
pub mod registry;
pub mod sinks;
pub mod storage;
pub mod tracker;
pub mod visibility;
pub mod watcher;

pub use context::TrackerContext;
pub use emitter::EventEmitter;
pub use identity::{generate_id, IdentityProvider, OsRandom, RandomSource, USER_ID_KEY};
pub use interaction::InteractionTracker;
pub use queue::{deliver, DeliveryStats, EventQueue, EventStream};
pub use registry::{LifecycleRegistry, RegistrationHandle};
pub use sinks::{LogSink, MemorySink};
pub use storage::MemoryStore;
pub use tracker::{Tracker, TrackerServices};
pub use visibility::{SeenState, VisibilityTracker};
pub use watcher::TreeWatcher;
