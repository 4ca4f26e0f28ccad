//! Tests for the tree watcher.

use super::*;
use std::sync::{OnceLock, Weak};

use barebone_host::{HeadlessDocument, Rect};
use barebone_protocols::{
    ClickEvent, ClickListener, EventPayload, MutationHandler, VisibilityHandler, VisibilityObserver,
};

use crate::identity::IdentityProvider;
use crate::queue::{EventQueue, EventStream};
use crate::storage::MemoryStore;
use crate::visibility::SeenState;

const MARKER: &str = "data-product";

fn context() -> TrackerContext {
    TrackerContext {
        client_id: "shop-1".to_string(),
        environment: "production".to_string(),
        marker_attribute: MARKER.to_string(),
        visibility_threshold: 0.5,
    }
}

fn emitter() -> (Arc<EventEmitter>, EventStream) {
    let identity = Arc::new(IdentityProvider::new(Arc::new(MemoryStore::new())));
    let (queue, stream) = EventQueue::channel();
    (
        Arc::new(EventEmitter::new(Arc::new(context()), identity, queue)),
        stream,
    )
}

fn watcher_on(doc: &Arc<HeadlessDocument>) -> (Arc<TreeWatcher>, EventStream) {
    let (emitter, stream) = emitter();
    (TreeWatcher::new(doc.clone(), &context(), emitter), stream)
}

fn doc() -> Arc<HeadlessDocument> {
    Arc::new(HeadlessDocument::new(1000.0, 800.0))
}

/// A detached marked element.
fn product(doc: &HeadlessDocument, id: &str, rect: Rect) -> ElementId {
    let el = doc.create_element("div");
    doc.set_attribute(el, MARKER, id).unwrap();
    doc.set_rect(el, rect).unwrap();
    el
}

fn offscreen() -> Rect {
    Rect::new(0.0, 5000.0, 100.0, 100.0)
}

fn payloads(stream: &mut EventStream) -> Vec<EventPayload> {
    stream.drain_ready().into_iter().map(|e| e.payload).collect()
}

fn impression(ids: &[&str]) -> EventPayload {
    EventPayload::Impression {
        product_ids: ids.iter().map(|id| Some(id.to_string())).collect(),
    }
}

fn click(id: &str) -> EventPayload {
    EventPayload::Click {
        product_id: Some(id.to_string()),
    }
}

#[test]
fn test_initial_scan_registers_each_once() {
    let doc = doc();
    let a = product(&doc, "p1", offscreen());
    let b = product(&doc, "p2", offscreen());
    let plain = doc.create_element("div");
    doc.append_child(doc.root(), a).unwrap();
    doc.append_child(doc.root(), plain).unwrap();
    doc.append_child(plain, b).unwrap();

    let (watcher, _stream) = watcher_on(&doc);
    assert_eq!(watcher.start(), 2);

    assert_eq!(watcher.registered_count(), 2);
    assert_eq!(doc.listener_count(a), 1);
    assert_eq!(doc.listener_count(b), 1);
    assert_eq!(doc.listener_count(plain), 0);
    assert_eq!(doc.observed_count(), 2);
    assert_eq!(doc.mutation_subscriber_count(), 1);

    assert!(!watcher.register(a));
    assert_eq!(doc.listener_count(a), 1);
}

#[test]
fn test_inserted_subtree_registers_all_descendants() {
    let doc = doc();
    let (watcher, _stream) = watcher_on(&doc);
    watcher.start();

    let list = doc.create_element("ul");
    let items: Vec<ElementId> = (0..5)
        .map(|i| {
            let li = doc.create_element("li");
            let card = product(&doc, &format!("p{}", i), offscreen());
            doc.append_child(li, card).unwrap();
            doc.append_child(list, li).unwrap();
            card
        })
        .collect();
    doc.append_child(doc.root(), list).unwrap();
    doc.flush();

    assert_eq!(watcher.registered_count(), 5);
    for card in items {
        assert!(watcher.is_registered(card));
        assert_eq!(doc.listener_count(card), 1);
    }
}

#[test]
fn test_marked_node_and_marked_descendant() {
    let doc = doc();
    let (watcher, _stream) = watcher_on(&doc);
    watcher.start();

    let outer = product(&doc, "outer", offscreen());
    let inner = product(&doc, "inner", offscreen());
    doc.append_child(outer, inner).unwrap();
    doc.append_child(doc.root(), outer).unwrap();
    doc.flush();

    assert!(watcher.is_registered(outer));
    assert!(watcher.is_registered(inner));
}

#[test]
fn test_text_nodes_are_skipped() {
    let doc = doc();
    let (watcher, _stream) = watcher_on(&doc);
    watcher.start();

    let text = doc.create_text("hello");
    doc.append_child(doc.root(), text).unwrap();
    doc.flush();
    doc.remove(text).unwrap();
    doc.flush();

    assert_eq!(watcher.registered_count(), 0);
}

#[test]
fn test_removed_subtree_releases_listeners() {
    let doc = doc();
    let section = doc.create_element("section");
    let a = product(&doc, "p1", offscreen());
    let b = product(&doc, "p2", offscreen());
    doc.append_child(section, a).unwrap();
    doc.append_child(section, b).unwrap();
    doc.append_child(doc.root(), section).unwrap();

    let (watcher, _stream) = watcher_on(&doc);
    watcher.start();
    assert_eq!(doc.total_listener_count(), 2);

    doc.remove(section).unwrap();
    doc.flush();

    assert_eq!(watcher.registered_count(), 0);
    assert_eq!(doc.total_listener_count(), 0);
    assert_eq!(doc.observed_count(), 0);
}

#[test]
fn test_move_within_document_keeps_one_listener() {
    let doc = doc();
    let left = doc.create_element("div");
    let right = doc.create_element("div");
    let card = product(&doc, "p1", offscreen());
    doc.append_child(doc.root(), left).unwrap();
    doc.append_child(doc.root(), right).unwrap();
    doc.append_child(left, card).unwrap();

    let (watcher, _stream) = watcher_on(&doc);
    watcher.start();

    doc.append_child(right, card).unwrap();
    doc.flush();

    assert!(watcher.is_registered(card));
    assert_eq!(doc.listener_count(card), 1);
}

#[test]
fn test_batch_with_add_and_remove_of_siblings() {
    let doc = doc();
    let (watcher, _stream) = watcher_on(&doc);
    watcher.start();

    let a = product(&doc, "p1", offscreen());
    let b = product(&doc, "p2", offscreen());
    doc.append_child(doc.root(), a).unwrap();
    doc.append_child(doc.root(), b).unwrap();
    doc.remove(a).unwrap();
    doc.flush();

    assert!(!watcher.is_registered(a));
    assert!(watcher.is_registered(b));
    assert_eq!(doc.listener_count(a), 0);
    assert_eq!(doc.listener_count(b), 1);
}

#[test]
fn test_reinsert_same_identifier() {
    let doc = doc();
    let old = product(&doc, "p1", Rect::new(0.0, 0.0, 100.0, 100.0));
    doc.append_child(doc.root(), old).unwrap();

    let (watcher, mut stream) = watcher_on(&doc);
    watcher.start();
    doc.flush();
    assert_eq!(payloads(&mut stream), vec![impression(&["p1"])]);

    doc.remove(old).unwrap();
    let new = product(&doc, "p1", Rect::new(0.0, 0.0, 100.0, 100.0));
    doc.append_child(doc.root(), new).unwrap();
    doc.flush();

    assert_eq!(doc.listener_count(old), 0);
    assert_eq!(doc.listener_count(new), 1);
    assert!(payloads(&mut stream).is_empty());

    doc.click(new).unwrap();
    assert_eq!(payloads(&mut stream), vec![click("p1")]);
}

#[test]
fn test_simultaneous_insertions_one_impression() {
    let doc = doc();
    let (watcher, mut stream) = watcher_on(&doc);
    watcher.start();

    for i in 0..3 {
        let card = product(&doc, &format!("p{}", i), Rect::new(0.0, i as f64 * 100.0, 100.0, 100.0));
        doc.append_child(doc.root(), card).unwrap();
    }
    doc.flush();

    assert_eq!(payloads(&mut stream), vec![impression(&["p0", "p1", "p2"])]);
}

#[test]
fn test_teardown_releases_everything() {
    let doc = doc();
    let a = product(&doc, "p1", offscreen());
    let b = product(&doc, "p2", offscreen());
    doc.append_child(doc.root(), a).unwrap();
    doc.append_child(doc.root(), b).unwrap();

    let (watcher, mut stream) = watcher_on(&doc);
    watcher.start();
    watcher.teardown();
    watcher.teardown();

    assert!(watcher.is_closed());
    assert_eq!(watcher.registered_count(), 0);
    assert_eq!(doc.total_listener_count(), 0);
    assert_eq!(doc.mutation_subscriber_count(), 0);
    assert_eq!(doc.visibility_observer_count(), 0);

    let c = product(&doc, "p3", Rect::new(0.0, 0.0, 100.0, 100.0));
    doc.append_child(doc.root(), c).unwrap();
    doc.scroll_to(0.0, 5000.0);
    doc.flush();
    doc.click(a).unwrap();
    doc.click(c).unwrap();

    assert!(payloads(&mut stream).is_empty());
    assert!(!watcher.register(c));
    assert_eq!(watcher.start(), 0);
}

#[test]
fn test_teardown_inside_mutation_handler() {
    let doc = doc();
    let (watcher, mut stream) = watcher_on(&doc);
    watcher.start();

    let target = watcher.clone();
    let _sub = doc.observe_mutations(Arc::new(move |_records: &[MutationRecord]| {
        target.teardown();
    }));

    let a = product(&doc, "p1", Rect::new(0.0, 0.0, 100.0, 100.0));
    doc.append_child(doc.root(), a).unwrap();
    doc.flush();

    assert!(watcher.is_closed());
    assert_eq!(doc.total_listener_count(), 0);
    assert!(payloads(&mut stream).is_empty());
}

#[test]
fn test_teardown_inside_click_listener() {
    let doc = doc();
    let a = product(&doc, "p1", offscreen());
    let b = product(&doc, "p2", offscreen());
    doc.append_child(doc.root(), a).unwrap();
    doc.append_child(doc.root(), b).unwrap();

    let (watcher, mut stream) = watcher_on(&doc);
    watcher.start();

    let target = watcher.clone();
    let teardown: ClickListener = Arc::new(move |_event: &ClickEvent| target.teardown());
    doc.add_click_listener(doc.root(), teardown.clone());

    doc.click(a).unwrap();
    doc.click(b).unwrap();

    assert_eq!(payloads(&mut stream), vec![click("p1")]);
    assert_eq!(doc.listener_count(a), 0);
    assert_eq!(doc.listener_count(b), 0);
    doc.remove_click_listener(doc.root(), &teardown);
}

#[test]
fn test_unregister_unknown_is_ignored() {
    let doc = doc();
    let (watcher, _stream) = watcher_on(&doc);
    assert!(!watcher.unregister(ElementId::new(77)));
}

/// Host that unregisters an element from inside `add_click_listener`,
/// between the registry's reserve and commit.
/// What the host does when it is called back for the victim element.
#[derive(Clone, Copy)]
enum Reentry {
    /// Unregister the victim while its click listener is being attached.
    Unregister,
    /// Unregister, then register it again, while its listener is attached.
    Reregister,
    /// Tear the watcher down while the victim's marker is being read.
    TeardownOnRead,
}

struct ReentrantHost {
    inner: Arc<HeadlessDocument>,
    victim: ElementId,
    reentry: Reentry,
    fired: AtomicBool,
    watcher: OnceLock<Weak<TreeWatcher>>,
}

impl ReentrantHost {
    fn new(inner: Arc<HeadlessDocument>, victim: ElementId, reentry: Reentry) -> Arc<Self> {
        Arc::new(Self {
            inner,
            victim,
            reentry,
            fired: AtomicBool::new(false),
            watcher: OnceLock::new(),
        })
    }

    /// The watcher, the first time the victim triggers a callback.
    fn fire(&self, element: ElementId) -> Option<Arc<TreeWatcher>> {
        if element != self.victim || self.fired.swap(true, Ordering::SeqCst) {
            return None;
        }
        self.watcher.get().and_then(Weak::upgrade)
    }
}

impl HostDocument for ReentrantHost {
    fn is_element(&self, node: ElementId) -> bool {
        self.inner.is_element(node)
    }

    fn has_attribute(&self, element: ElementId, name: &str) -> bool {
        self.inner.has_attribute(element, name)
    }

    fn get_attribute(&self, element: ElementId, name: &str) -> Option<String> {
        if matches!(self.reentry, Reentry::TeardownOnRead) {
            if let Some(watcher) = self.fire(element) {
                watcher.teardown();
            }
        }
        self.inner.get_attribute(element, name)
    }

    fn query_marked(&self, scope: QueryScope, attribute: &str) -> Vec<ElementId> {
        self.inner.query_marked(scope, attribute)
    }

    fn observe_mutations(&self, handler: MutationHandler) -> Subscription {
        self.inner.observe_mutations(handler)
    }

    fn create_visibility_observer(
        &self,
        threshold: f64,
        handler: VisibilityHandler,
    ) -> Box<dyn VisibilityObserver> {
        self.inner.create_visibility_observer(threshold, handler)
    }

    fn add_click_listener(&self, element: ElementId, listener: ClickListener) {
        self.inner.add_click_listener(element, listener);
        if matches!(self.reentry, Reentry::TeardownOnRead) {
            return;
        }
        if let Some(watcher) = self.fire(element) {
            watcher.unregister(element);
            if matches!(self.reentry, Reentry::Reregister) {
                watcher.register(element);
            }
        }
    }

    fn remove_click_listener(&self, element: ElementId, listener: &ClickListener) -> bool {
        self.inner.remove_click_listener(element, listener)
    }
}

fn reentrant_watcher(host: &Arc<ReentrantHost>) -> (Arc<TreeWatcher>, EventStream) {
    let (emitter, stream) = emitter();
    let watcher = TreeWatcher::new(host.clone(), &context(), emitter);
    host.watcher.set(Arc::downgrade(&watcher)).unwrap();
    (watcher, stream)
}

#[test]
fn test_nested_unregister_rolls_back_registration() {
    let doc = doc();
    let victim = product(&doc, "p1", offscreen());
    let survivor = product(&doc, "p2", offscreen());
    doc.append_child(doc.root(), victim).unwrap();
    doc.append_child(doc.root(), survivor).unwrap();

    let host = ReentrantHost::new(doc.clone(), victim, Reentry::Unregister);
    let (watcher, _stream) = reentrant_watcher(&host);

    assert_eq!(watcher.start(), 1);
    assert!(!watcher.registry().contains(victim));
    assert_eq!(doc.listener_count(victim), 0);
    assert!(watcher.visibility().state_of(victim).is_none());
    assert!(watcher.is_registered(survivor));
    assert_eq!(doc.listener_count(survivor), 1);
}

#[test]
fn test_nested_reregister_keeps_its_trackers() {
    let doc = doc();
    let victim = product(&doc, "p1", offscreen());
    let survivor = product(&doc, "p2", offscreen());
    doc.append_child(doc.root(), victim).unwrap();
    doc.append_child(doc.root(), survivor).unwrap();

    let host = ReentrantHost::new(doc.clone(), victim, Reentry::Reregister);
    let (watcher, _stream) = reentrant_watcher(&host);
    watcher.start();

    // The nested registration won; the outer attempt undid only its own listener.
    assert_eq!(watcher.registered_count(), 2);
    assert!(watcher.is_registered(victim));
    assert_eq!(doc.listener_count(victim), 1);
    assert_eq!(watcher.visibility().state_of(victim), Some(SeenState::Unseen));
    let handle = watcher.registry().handle(victim).unwrap();
    let stored = watcher.interaction().listener_for(victim).unwrap();
    assert!(barebone_protocols::same_listener(&handle.listener, &stored));

    assert!(watcher.unregister(victim));
    assert_eq!(doc.listener_count(victim), 0);
    assert!(watcher.visibility().state_of(victim).is_none());
    assert!(watcher.register(victim));
    assert_eq!(doc.listener_count(victim), 1);
}

#[test]
fn test_teardown_inside_visibility_tick() {
    let doc = doc();
    let a = product(&doc, "p1", Rect::new(0.0, 0.0, 100.0, 100.0));
    let b = product(&doc, "p2", Rect::new(200.0, 0.0, 100.0, 100.0));
    doc.append_child(doc.root(), a).unwrap();
    doc.append_child(doc.root(), b).unwrap();

    let host = ReentrantHost::new(doc.clone(), a, Reentry::TeardownOnRead);
    let (watcher, mut stream) = reentrant_watcher(&host);
    assert_eq!(watcher.start(), 2);
    doc.flush();

    assert!(watcher.is_closed());
    assert!(watcher.visibility().is_disconnected());
    assert_eq!(watcher.visibility().watched_count(), 0);
    assert_eq!(watcher.registered_count(), 0);
    assert_eq!(doc.total_listener_count(), 0);
    assert_eq!(doc.visibility_observer_count(), 0);
    assert_eq!(doc.mutation_subscriber_count(), 0);

    doc.scroll_to(0.0, 5000.0);
    doc.scroll_to(0.0, 0.0);
    doc.flush();
    doc.click(b).unwrap();
    assert!(payloads(&mut stream).is_empty());
}
