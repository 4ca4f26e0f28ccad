//! # Barebone Host
//!
//! A headless, in-memory implementation of [`HostDocument`] so the tracker
//! can run without a browser: scripted replays, and tests.
//!
//! Notifications are not delivered as they occur. Mutation records and
//! visibility changes accumulate until [`HeadlessDocument::flush`] (or one of
//! the finer-grained flushes) hands them to subscribers as batches, the way a
//! browser delivers them at the end of a task.
//!
//! [`HostDocument`]: barebone_protocols::HostDocument

mod document;
mod error;
mod geometry;
mod node;
mod observer;

pub use document::HeadlessDocument;
pub use error::HostError;
pub use geometry::Rect;
