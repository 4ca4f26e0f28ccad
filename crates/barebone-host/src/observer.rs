//! Visibility observers for the headless document.

use std::sync::Weak;

use parking_lot::Mutex;

use barebone_protocols::{ElementId, VisibilityEntry, VisibilityHandler, VisibilityObserver};

use crate::document::DocumentState;

/// Last computed visibility of an observed target.
#[derive(Debug, Clone, Copy)]
struct Sample {
    ratio: f64,
    intersecting: bool,
}

#[derive(Debug, Clone)]
struct ObservedTarget {
    element: ElementId,
    /// `None` until the first tick after `observe`.
    previous: Option<Sample>,
}

/// Registration of one observer inside the document.
pub(crate) struct ObserverState {
    threshold: f64,
    handler: VisibilityHandler,
    targets: Vec<ObservedTarget>,
}

impl ObserverState {
    pub fn new(threshold: f64, handler: VisibilityHandler) -> Self {
        Self {
            threshold,
            handler,
            targets: Vec::new(),
        }
    }

    pub fn handler(&self) -> VisibilityHandler {
        self.handler.clone()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn observe(&mut self, element: ElementId) {
        if !self.targets.iter().any(|t| t.element == element) {
            self.targets.push(ObservedTarget {
                element,
                previous: None,
            });
        }
    }

    pub fn unobserve(&mut self, element: ElementId) {
        self.targets.retain(|t| t.element != element);
    }

    /// Recompute every target and return the entries for this tick.
    ///
    /// A target produces an entry on its first computation, when it starts
    /// or stops intersecting, and when its ratio crosses the threshold in
    /// either direction.
    pub fn take_entries<F>(&mut self, ratio_of: F) -> Vec<VisibilityEntry>
    where
        F: Fn(ElementId) -> f64,
    {
        let threshold = self.threshold;
        let mut entries = Vec::new();

        for target in &mut self.targets {
            let ratio = ratio_of(target.element);
            let current = Sample {
                ratio,
                intersecting: ratio > 0.0,
            };

            let changed = match target.previous {
                None => true,
                Some(prev) => {
                    prev.intersecting != current.intersecting
                        || (prev.ratio >= threshold) != (current.ratio >= threshold)
                }
            };
            target.previous = Some(current);

            if changed {
                entries.push(VisibilityEntry {
                    target: target.element,
                    is_intersecting: current.intersecting,
                    intersection_ratio: current.ratio,
                });
            }
        }

        entries
    }
}

/// Handle given to the tracker. Holds the document weakly.
pub(crate) struct HeadlessVisibilityObserver {
    id: u64,
    state: Weak<Mutex<DocumentState>>,
}

impl HeadlessVisibilityObserver {
    pub fn new(id: u64, state: Weak<Mutex<DocumentState>>) -> Self {
        Self { id, state }
    }

    fn with_observer<F>(&self, f: F)
    where
        F: FnOnce(&mut ObserverState),
    {
        if let Some(state) = self.state.upgrade() {
            let mut state = state.lock();
            if let Some(observer) = state.observers.get_mut(&self.id) {
                f(observer);
            }
        }
    }
}

impl VisibilityObserver for HeadlessVisibilityObserver {
    fn observe(&self, element: ElementId) {
        self.with_observer(|observer| observer.observe(element));
    }

    fn unobserve(&self, element: ElementId) {
        self.with_observer(|observer| observer.unobserve(element));
    }

    fn disconnect(&self) {
        if let Some(state) = self.state.upgrade() {
            state.lock().observers.remove(&self.id);
        }
    }
}
