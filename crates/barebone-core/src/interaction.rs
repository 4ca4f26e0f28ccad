//! Click tracking.
//!
//! Every watched element gets exactly one listener. The listener `Arc` is
//! stored by element so that `unwatch` can hand the host the very same
//! allocation; the host matches listeners by pointer identity.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use barebone_protocols::{same_listener, ClickEvent, ClickListener, ElementId, HostDocument};

use crate::emitter::EventEmitter;

pub struct InteractionTracker {
    host: Arc<dyn HostDocument>,
    emitter: Weak<EventEmitter>,
    marker_attribute: Arc<str>,
    listeners: Mutex<HashMap<ElementId, ClickListener>>,
}

impl InteractionTracker {
    pub fn new(
        host: Arc<dyn HostDocument>,
        emitter: &Arc<EventEmitter>,
        marker_attribute: impl Into<String>,
    ) -> Self {
        let marker_attribute: String = marker_attribute.into();
        Self {
            host,
            emitter: Arc::downgrade(emitter),
            marker_attribute: Arc::from(marker_attribute),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a click listener to `element`, or return the one already
    /// attached.
    pub fn watch(&self, element: ElementId) -> ClickListener {
        let listener = {
            let mut listeners = self.listeners.lock();
            if let Some(existing) = listeners.get(&element) {
                return existing.clone();
            }
            let listener = self.make_listener(element);
            listeners.insert(element, listener.clone());
            listener
        };

        self.host.add_click_listener(element, listener.clone());
        debug!("Click listener attached to {}", element);
        listener
    }

    /// Detach the stored listener. Unknown elements are ignored.
    pub fn unwatch(&self, element: ElementId) -> bool {
        let Some(listener) = self.listeners.lock().remove(&element) else {
            return false;
        };
        let detached = self.host.remove_click_listener(element, &listener);
        debug!("Click listener removed from {} (detached: {})", element, detached);
        true
    }

    /// Detach one specific listener instance.
    ///
    /// The stored entry is dropped only when it is that same instance, so a
    /// listener attached by a later registration of the element stays put.
    pub fn detach(&self, element: ElementId, listener: &ClickListener) -> bool {
        {
            let mut listeners = self.listeners.lock();
            if listeners
                .get(&element)
                .is_some_and(|stored| same_listener(stored, listener))
            {
                listeners.remove(&element);
            }
        }
        self.host.remove_click_listener(element, listener)
    }

    /// The listener attached to `element`, if any.
    pub fn listener_for(&self, element: ElementId) -> Option<ClickListener> {
        self.listeners.lock().get(&element).cloned()
    }

    pub fn watched_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// The listener reads the marker attribute when the click happens, not
    /// when it is attached. Both the host and the emitter are held weakly.
    fn make_listener(&self, element: ElementId) -> ClickListener {
        let host = Arc::downgrade(&self.host);
        let emitter = self.emitter.clone();
        let marker_attribute = self.marker_attribute.clone();

        Arc::new(move |_event: &ClickEvent| {
            let (Some(host), Some(emitter)) = (host.upgrade(), emitter.upgrade()) else {
                return;
            };
            let product_id = host.get_attribute(element, &marker_attribute);
            emitter.emit_click(product_id);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barebone_host::{HeadlessDocument, Rect};
    use barebone_protocols::EventPayload;

    use crate::context::TrackerContext;
    use crate::identity::IdentityProvider;
    use crate::queue::{EventQueue, EventStream};
    use crate::storage::MemoryStore;

    const MARKER: &str = "data-product";

    fn setup() -> (Arc<HeadlessDocument>, Arc<EventEmitter>, InteractionTracker, EventStream) {
        let doc = Arc::new(HeadlessDocument::new(800.0, 600.0));
        let context = Arc::new(TrackerContext {
            client_id: "shop-1".to_string(),
            environment: "production".to_string(),
            marker_attribute: MARKER.to_string(),
            visibility_threshold: 0.5,
        });
        let identity = Arc::new(IdentityProvider::new(Arc::new(MemoryStore::new())));
        let (queue, stream) = EventQueue::channel();
        let emitter = Arc::new(EventEmitter::new(context, identity, queue));
        let tracker = InteractionTracker::new(doc.clone(), &emitter, MARKER);
        (doc, emitter, tracker, stream)
    }

    fn product(doc: &HeadlessDocument, id: &str) -> ElementId {
        let el = doc.create_element("div");
        doc.set_attribute(el, MARKER, id).unwrap();
        doc.set_rect(el, Rect::new(0.0, 0.0, 50.0, 50.0)).unwrap();
        doc.append_child(doc.root(), el).unwrap();
        el
    }

    fn clicks(stream: &mut EventStream) -> Vec<Option<String>> {
        stream
            .drain_ready()
            .into_iter()
            .filter_map(|event| match event.payload {
                EventPayload::Click { product_id } => Some(product_id),
                EventPayload::Impression { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_watch_attaches_one_listener() {
        let (doc, _emitter, tracker, _stream) = setup();
        let el = product(&doc, "p1");

        let first = tracker.watch(el);
        let second = tracker.watch(el);

        assert!(same_listener(&first, &second));
        assert_eq!(doc.listener_count(el), 1);
        assert_eq!(tracker.watched_count(), 1);
    }

    #[test]
    fn test_click_emits_product_id() {
        let (doc, _emitter, tracker, mut stream) = setup();
        let el = product(&doc, "p2");
        tracker.watch(el);

        doc.click(el).unwrap();
        assert_eq!(clicks(&mut stream), vec![Some("p2".to_string())]);
    }

    #[test]
    fn test_attribute_read_at_click_time() {
        let (doc, _emitter, tracker, mut stream) = setup();
        let el = product(&doc, "old");
        tracker.watch(el);

        doc.set_attribute(el, MARKER, "new").unwrap();
        doc.click(el).unwrap();
        assert_eq!(clicks(&mut stream), vec![Some("new".to_string())]);
    }

    #[test]
    fn test_click_on_child_reports_marked_ancestor() {
        let (doc, _emitter, tracker, mut stream) = setup();
        let el = product(&doc, "p3");
        let label = doc.create_element("span");
        doc.append_child(el, label).unwrap();
        tracker.watch(el);

        doc.click(label).unwrap();
        assert_eq!(clicks(&mut stream), vec![Some("p3".to_string())]);
    }

    #[test]
    fn test_unwatch_detaches_exact_listener() {
        let (doc, _emitter, tracker, mut stream) = setup();
        let el = product(&doc, "p1");
        tracker.watch(el);

        assert!(tracker.unwatch(el));
        assert!(!tracker.unwatch(el));
        assert_eq!(doc.listener_count(el), 0);
        assert!(tracker.listener_for(el).is_none());

        doc.click(el).unwrap();
        assert!(clicks(&mut stream).is_empty());
    }

    #[test]
    fn test_fresh_equivalent_listener_does_not_detach() {
        let (doc, _emitter, tracker, _stream) = setup();
        let el = product(&doc, "p1");
        let stored = tracker.watch(el);

        let fresh = tracker.make_listener(el);
        assert!(!doc.remove_click_listener(el, &fresh));
        assert_eq!(doc.listener_count(el), 1);

        assert!(doc.remove_click_listener(el, &stored));
        assert_eq!(doc.listener_count(el), 0);
    }

    #[test]
    fn test_detach_keeps_newer_listener() {
        let (doc, _emitter, tracker, _stream) = setup();
        let el = product(&doc, "p1");
        let old = tracker.watch(el);
        tracker.unwatch(el);
        let current = tracker.watch(el);

        assert!(!tracker.detach(el, &old));
        assert!(same_listener(&tracker.listener_for(el).unwrap(), &current));
        assert_eq!(doc.listener_count(el), 1);

        assert!(tracker.detach(el, &current));
        assert!(tracker.listener_for(el).is_none());
        assert_eq!(doc.listener_count(el), 0);
    }

    #[test]
    fn test_listener_inert_after_emitter_dropped() {
        let (doc, emitter, tracker, mut stream) = setup();
        let el = product(&doc, "p1");
        tracker.watch(el);

        drop(emitter);
        assert_eq!(doc.click(el).unwrap(), 1);
        assert!(clicks(&mut stream).is_empty());
    }
}
