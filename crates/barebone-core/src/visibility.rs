//! Visibility tracking.
//!
//! Each watched element moves from [`SeenState::Unseen`] to
//! [`SeenState::Reported`] the first time a tick reports it intersecting at
//! or above the threshold. Identifiers are deduplicated per session: once a
//! product identifier has been reported, no element carrying it is reported
//! again, even after being detached and reattached.

#[cfg(test)]
#[path = "visibility_tests.rs"]
mod tests;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use barebone_protocols::{ElementId, HostDocument, ProductId, VisibilityEntry, VisibilityObserver};

use crate::emitter::EventEmitter;

/// Per-element visibility state. There is no transition back to `Unseen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeenState {
    Unseen,
    Reported,
}

/// Watches elements and emits one coalesced impression per tick.
pub struct VisibilityTracker {
    host: Arc<dyn HostDocument>,
    emitter: Arc<EventEmitter>,
    marker_attribute: String,
    threshold: f64,
    observer: Box<dyn VisibilityObserver>,
    watched: Mutex<HashMap<ElementId, SeenState>>,
    /// Identifiers already reported in this session.
    session: Mutex<HashSet<ProductId>>,
    disconnected: AtomicBool,
}

impl VisibilityTracker {
    /// Create the tracker and its host observer.
    ///
    /// The observer's handler holds the tracker weakly.
    pub fn new(
        host: Arc<dyn HostDocument>,
        emitter: Arc<EventEmitter>,
        marker_attribute: impl Into<String>,
        threshold: f64,
    ) -> Arc<Self> {
        let marker_attribute = marker_attribute.into();
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let observer = host.create_visibility_observer(
                threshold,
                Arc::new(move |entries: &[VisibilityEntry]| {
                    if let Some(tracker) = weak.upgrade() {
                        tracker.handle_tick(entries);
                    }
                }),
            );

            Self {
                host,
                emitter,
                marker_attribute,
                threshold,
                observer,
                watched: Mutex::new(HashMap::new()),
                session: Mutex::new(HashSet::new()),
                disconnected: AtomicBool::new(false),
            }
        })
    }

    /// Start watching an element. Returns `false` if it was already watched
    /// or the tracker is disconnected.
    pub fn watch(&self, element: ElementId) -> bool {
        if self.is_disconnected() {
            return false;
        }
        let inserted = {
            let mut watched = self.watched.lock();
            if watched.contains_key(&element) {
                false
            } else {
                watched.insert(element, SeenState::Unseen);
                true
            }
        };
        if inserted {
            self.observer.observe(element);
        }
        inserted
    }

    /// Stop watching an element. Unknown elements are ignored.
    pub fn unwatch(&self, element: ElementId) -> bool {
        let removed = self.watched.lock().remove(&element).is_some();
        if removed {
            self.observer.unobserve(element);
        }
        removed
    }

    /// Release the host observer. Later ticks and watches are ignored.
    pub fn disconnect(&self) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }
        self.observer.disconnect();
        self.watched.lock().clear();
        debug!("Visibility observer disconnected");
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub fn state_of(&self, element: ElementId) -> Option<SeenState> {
        self.watched.lock().get(&element).copied()
    }

    pub fn watched_count(&self) -> usize {
        self.watched.lock().len()
    }

    /// Whether the identifier has been reported in this session.
    pub fn has_reported(&self, product_id: &ProductId) -> bool {
        self.session.lock().contains(product_id)
    }

    /// Process one visibility tick.
    ///
    /// Returns the number of identifiers in the emitted impression, `0` when
    /// nothing was emitted.
    pub fn handle_tick(&self, entries: &[VisibilityEntry]) -> usize {
        if self.is_disconnected() {
            return 0;
        }

        let crossed: Vec<ElementId> = {
            let mut watched = self.watched.lock();
            entries
                .iter()
                .filter(|entry| entry.is_intersecting && entry.intersection_ratio >= self.threshold)
                .filter_map(|entry| match watched.get_mut(&entry.target) {
                    Some(state) if *state == SeenState::Unseen => {
                        *state = SeenState::Reported;
                        Some(entry.target)
                    }
                    _ => None,
                })
                .collect()
        };

        let mut batch = Vec::with_capacity(crossed.len());
        for element in crossed {
            let product_id = self.host.get_attribute(element, &self.marker_attribute);
            if self.session.lock().insert(product_id.clone()) {
                batch.push(product_id);
            } else {
                debug!("Skipping {}: identifier already reported", element);
            }
        }

        // A teardown during this tick suppresses its impression.
        if batch.is_empty() || self.is_disconnected() {
            return 0;
        }
        let count = batch.len();
        debug!("Visibility tick reported {} product(s)", count);
        self.emitter.emit_impression(batch);
        count
    }
}
