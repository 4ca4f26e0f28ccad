//! Tree watcher.
//!
//! Orchestrates registration: an initial scan of the document, then
//! incremental register/unregister from mutation batches, and a teardown
//! that leaves nothing attached.

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use barebone_protocols::{ElementId, HostDocument, MutationRecord, QueryScope, Subscription};

use crate::context::TrackerContext;
use crate::emitter::EventEmitter;
use crate::interaction::InteractionTracker;
use crate::registry::{LifecycleRegistry, RegistrationHandle};
use crate::visibility::VisibilityTracker;

pub struct TreeWatcher {
    host: Arc<dyn HostDocument>,
    marker_attribute: String,
    registry: LifecycleRegistry,
    visibility: Arc<VisibilityTracker>,
    interaction: InteractionTracker,
    subscription: Mutex<Option<Subscription>>,
    closed: AtomicBool,
}

impl TreeWatcher {
    pub fn new(
        host: Arc<dyn HostDocument>,
        context: &TrackerContext,
        emitter: Arc<EventEmitter>,
    ) -> Arc<Self> {
        let visibility = VisibilityTracker::new(
            host.clone(),
            emitter.clone(),
            context.marker_attribute.clone(),
            context.visibility_threshold,
        );
        let interaction =
            InteractionTracker::new(host.clone(), &emitter, context.marker_attribute.clone());

        Arc::new(Self {
            host,
            marker_attribute: context.marker_attribute.clone(),
            registry: LifecycleRegistry::new(),
            visibility,
            interaction,
            subscription: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Register every marked element, then subscribe to mutations.
    ///
    /// Returns the number of elements registered by the scan.
    pub fn start(self: &Arc<Self>) -> usize {
        if self.is_closed() {
            return 0;
        }

        let found = self
            .host
            .query_marked(QueryScope::Document, &self.marker_attribute);
        let registered = found.into_iter().filter(|el| self.register(*el)).count();
        info!("Initial scan registered {} element(s)", registered);

        let weak = Arc::downgrade(self);
        let subscription = self
            .host
            .observe_mutations(Arc::new(move |records: &[MutationRecord]| {
                if let Some(watcher) = weak.upgrade() {
                    watcher.process_batch(records);
                }
            }));

        let mut slot = self.subscription.lock();
        if self.is_closed() {
            drop(slot);
            subscription.unsubscribe();
        } else {
            *slot = Some(subscription);
        }
        registered
    }

    /// Register one element with both trackers. No-op if already registered
    /// or the watcher is closed.
    pub fn register(&self, element: ElementId) -> bool {
        if self.is_closed() || !self.registry.reserve(element) {
            return false;
        }

        let visibility_watched = self.visibility.watch(element);
        let listener = self.interaction.watch(element);

        if let Err(handle) = self
            .registry
            .commit(RegistrationHandle::new(element, listener, visibility_watched))
        {
            debug!("Registration of {} cancelled, rolling back", element);
            // Only this attempt's listener is detached. If a nested register
            // re-created the slot, the visibility watch belongs to it.
            self.interaction.detach(element, &handle.listener);
            if !self.registry.contains(element) {
                self.visibility.unwatch(element);
            }
            return false;
        }

        debug!("Registered {}", element);
        true
    }

    /// Unregister one element from both trackers. Unknown elements are
    /// ignored.
    pub fn unregister(&self, element: ElementId) -> bool {
        if !self.registry.contains(element) {
            return false;
        }
        self.visibility.unwatch(element);
        self.interaction.unwatch(element);
        self.registry.release(element);
        debug!("Unregistered {}", element);
        true
    }

    /// Apply one mutation batch in record order.
    ///
    /// Stops at the first record seen after teardown.
    pub fn process_batch(&self, records: &[MutationRecord]) {
        debug!("Processing mutation batch of {} record(s)", records.len());
        for record in records {
            for node in &record.added_nodes {
                if self.is_closed() {
                    return;
                }
                self.register_subtree(*node);
            }
            for node in &record.removed_nodes {
                if self.is_closed() {
                    return;
                }
                self.unregister_subtree(*node);
            }
        }
    }

    /// Cancel every subscription and release every element.
    ///
    /// Idempotent, and safe to call from inside a mutation handler, a
    /// visibility tick or a click listener.
    pub fn teardown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let subscription = self.subscription.lock().take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        self.visibility.disconnect();

        let elements = self.registry.elements();
        let released = elements.len();
        for element in elements {
            self.unregister(element);
        }
        info!("Tracker torn down, released {} element(s)", released);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn registered_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_registered(&self, element: ElementId) -> bool {
        self.registry.is_active(element)
    }

    pub fn registry(&self) -> &LifecycleRegistry {
        &self.registry
    }

    pub fn visibility(&self) -> &VisibilityTracker {
        &self.visibility
    }

    pub fn interaction(&self) -> &InteractionTracker {
        &self.interaction
    }

    fn register_subtree(&self, node: ElementId) {
        if !self.host.is_element(node) {
            return;
        }
        if self.host.has_attribute(node, &self.marker_attribute) {
            self.register(node);
        }
        for descendant in self
            .host
            .query_marked(QueryScope::DescendantsOf(node), &self.marker_attribute)
        {
            self.register(descendant);
        }
    }

    fn unregister_subtree(&self, node: ElementId) {
        if !self.host.is_element(node) {
            return;
        }
        self.unregister(node);
        for descendant in self
            .host
            .query_marked(QueryScope::DescendantsOf(node), &self.marker_attribute)
        {
            self.unregister(descendant);
        }
    }
}
