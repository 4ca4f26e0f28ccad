//! Headless document implementation.

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use barebone_protocols::{
    same_listener, ClickEvent, ClickListener, ElementId, HostDocument, MutationHandler,
    MutationRecord, QueryScope, Subscription, VisibilityHandler, VisibilityObserver,
};

use crate::error::HostError;
use crate::geometry::Rect;
use crate::node::Node;
use crate::observer::{HeadlessVisibilityObserver, ObserverState};

/// Upper bound on mutation rounds in [`HeadlessDocument::flush`] when
/// handlers keep mutating the tree.
const MAX_FLUSH_ROUNDS: usize = 64;

pub(crate) struct DocumentState {
    nodes: Vec<Node>,
    root: ElementId,
    viewport_width: f64,
    viewport_height: f64,
    scroll_x: f64,
    scroll_y: f64,
    pending: Vec<MutationRecord>,
    mutation_handlers: Vec<(u64, MutationHandler)>,
    pub(crate) observers: BTreeMap<u64, ObserverState>,
    listeners: HashMap<ElementId, Vec<ClickListener>>,
    next_handle: u64,
}

impl DocumentState {
    fn node(&self, id: ElementId) -> Result<&Node, HostError> {
        self.nodes
            .get(id.as_u64() as usize)
            .ok_or(HostError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: ElementId) -> Result<&mut Node, HostError> {
        self.nodes
            .get_mut(id.as_u64() as usize)
            .ok_or(HostError::NodeNotFound(id))
    }

    fn element_mut(&mut self, id: ElementId) -> Result<&mut Node, HostError> {
        let node = self.node_mut(id)?;
        if node.is_element() {
            Ok(node)
        } else {
            Err(HostError::NotAnElement(id))
        }
    }

    fn insert(&mut self, node: Node) -> ElementId {
        let id = ElementId::new(self.nodes.len() as u64);
        self.nodes.push(node);
        id
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn is_connected(&self, id: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == self.root {
                return true;
            }
            current = self.node(node_id).ok().and_then(|n| n.parent);
        }
        false
    }

    fn is_ancestor(&self, ancestor: ElementId, of: ElementId) -> bool {
        let mut current = self.node(of).ok().and_then(|n| n.parent);
        while let Some(node_id) = current {
            if node_id == ancestor {
                return true;
            }
            current = self.node(node_id).ok().and_then(|n| n.parent);
        }
        false
    }

    fn viewport(&self) -> Rect {
        Rect::new(
            self.scroll_x,
            self.scroll_y,
            self.viewport_width,
            self.viewport_height,
        )
    }

    fn visible_fraction(&self, id: ElementId) -> f64 {
        if !self.is_connected(id) {
            return 0.0;
        }
        match self.node(id) {
            Ok(node) => node.rect.visible_fraction(&self.viewport()),
            Err(_) => 0.0,
        }
    }

    /// Depth-first, document-order walk of the descendants of `from`.
    fn descendants(&self, from: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = match self.node(from) {
            Ok(node) => node.children.iter().rev().copied().collect(),
            Err(_) => return out,
        };
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Ok(node) = self.node(id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    fn detach(&mut self, parent: ElementId, child: ElementId) -> Result<(), HostError> {
        let parent_node = self.node_mut(parent)?;
        let position = parent_node
            .children
            .iter()
            .position(|c| *c == child)
            .ok_or(HostError::NotAChild { parent, child })?;
        parent_node.children.remove(position);
        self.node_mut(child)?.parent = None;

        if self.is_connected(parent) {
            self.pending.push(MutationRecord::removed(parent, child));
        }
        Ok(())
    }

    fn has_listener(&self, element: ElementId, listener: &ClickListener) -> bool {
        self.listeners
            .get(&element)
            .is_some_and(|list| list.iter().any(|l| same_listener(l, listener)))
    }
}

/// In-memory UI tree implementing [`HostDocument`].
///
/// Node `#0` is the root (`body`). Element rectangles are in document
/// coordinates; the viewport is a window of the configured size at the
/// current scroll offset.
pub struct HeadlessDocument {
    state: Arc<Mutex<DocumentState>>,
}

impl HeadlessDocument {
    /// Create a document with an empty `body` and a viewport of the given size.
    pub fn new(viewport_width: f64, viewport_height: f64) -> Self {
        let mut body = Node::element("body");
        body.rect = Rect::new(0.0, 0.0, viewport_width, viewport_height);

        let state = DocumentState {
            nodes: vec![body],
            root: ElementId::new(0),
            viewport_width,
            viewport_height,
            scroll_x: 0.0,
            scroll_y: 0.0,
            pending: Vec::new(),
            mutation_handlers: Vec::new(),
            observers: BTreeMap::new(),
            listeners: HashMap::new(),
            next_handle: 0,
        };

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn root(&self) -> ElementId {
        self.state.lock().root
    }

    // ------------------------------------------------------------------
    // Tree construction
    // ------------------------------------------------------------------

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> ElementId {
        self.state.lock().insert(Node::element(tag))
    }

    /// Create a detached text node.
    pub fn create_text(&self, content: &str) -> ElementId {
        self.state.lock().insert(Node::text(content))
    }

    pub fn set_attribute(&self, element: ElementId, name: &str, value: &str) -> Result<(), HostError> {
        let mut state = self.state.lock();
        if let Some(attributes) = state.element_mut(element)?.attributes_mut() {
            attributes.insert(name.to_string(), value.to_string());
        }
        Ok(())
    }

    pub fn remove_attribute(&self, element: ElementId, name: &str) -> Result<(), HostError> {
        let mut state = self.state.lock();
        if let Some(attributes) = state.element_mut(element)?.attributes_mut() {
            attributes.remove(name);
        }
        Ok(())
    }

    pub fn set_rect(&self, element: ElementId, rect: Rect) -> Result<(), HostError> {
        self.state.lock().element_mut(element)?.rect = rect;
        Ok(())
    }

    pub fn rect(&self, element: ElementId) -> Option<Rect> {
        self.state.lock().node(element).ok().map(|n| n.rect)
    }

    pub fn tag_name(&self, element: ElementId) -> Option<String> {
        let state = self.state.lock();
        state.node(element).ok().and_then(|n| n.tag().map(str::to_string))
    }

    pub fn text_content(&self, node: ElementId) -> Option<String> {
        let state = self.state.lock();
        state.node(node).ok().and_then(|n| n.text_content().map(str::to_string))
    }

    pub fn parent(&self, node: ElementId) -> Option<ElementId> {
        self.state.lock().node(node).ok().and_then(|n| n.parent)
    }

    pub fn children(&self, node: ElementId) -> Vec<ElementId> {
        let state = self.state.lock();
        state.node(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    /// Append `child` under `parent`, moving it from its old parent if any.
    ///
    /// Queues a mutation record for each connected parent involved.
    pub fn append_child(&self, parent: ElementId, child: ElementId) -> Result<(), HostError> {
        let mut state = self.state.lock();
        state.element_mut(parent)?;
        state.node(child)?;
        if parent == child || state.is_ancestor(child, parent) {
            return Err(HostError::HierarchyRequest { parent, child });
        }

        if let Some(old_parent) = state.node(child)?.parent {
            state.detach(old_parent, child)?;
        }

        state.node_mut(parent)?.children.push(child);
        state.node_mut(child)?.parent = Some(parent);

        if state.is_connected(parent) {
            state.pending.push(MutationRecord::added(parent, child));
        }
        Ok(())
    }

    /// Detach `child` from `parent`. The child keeps its own subtree.
    pub fn remove_child(&self, parent: ElementId, child: ElementId) -> Result<(), HostError> {
        let mut state = self.state.lock();
        state.node(child)?;
        state.detach(parent, child)
    }

    /// Detach a node from whatever parent it has. No-op for detached nodes.
    pub fn remove(&self, node: ElementId) -> Result<(), HostError> {
        let mut state = self.state.lock();
        match state.node(node)?.parent {
            Some(parent) => state.detach(parent, node),
            None => Ok(()),
        }
    }

    pub fn is_connected(&self, node: ElementId) -> bool {
        self.state.lock().is_connected(node)
    }

    // ------------------------------------------------------------------
    // Viewport
    // ------------------------------------------------------------------

    pub fn scroll_to(&self, x: f64, y: f64) {
        let mut state = self.state.lock();
        state.scroll_x = x;
        state.scroll_y = y;
    }

    pub fn resize_viewport(&self, width: f64, height: f64) {
        let mut state = self.state.lock();
        state.viewport_width = width;
        state.viewport_height = height;
    }

    pub fn viewport(&self) -> Rect {
        self.state.lock().viewport()
    }

    /// Current visible fraction of an element, `0` when detached.
    pub fn visible_fraction(&self, element: ElementId) -> f64 {
        self.state.lock().visible_fraction(element)
    }

    // ------------------------------------------------------------------
    // Notification delivery
    // ------------------------------------------------------------------

    pub fn pending_mutation_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Deliver queued mutation records to every subscriber as one batch.
    ///
    /// Returns the number of records in the batch.
    pub fn flush_mutations(&self) -> usize {
        let (batch, handlers) = {
            let mut state = self.state.lock();
            if state.pending.is_empty() {
                return 0;
            }
            let batch = std::mem::take(&mut state.pending);
            let handlers: Vec<(u64, MutationHandler)> = state.mutation_handlers.clone();
            (batch, handlers)
        };

        debug!(records = batch.len(), subscribers = handlers.len(), "delivering mutation batch");

        for (id, handler) in handlers {
            // A subscriber cancelled by an earlier one in this round is skipped.
            let subscribed = self
                .state
                .lock()
                .mutation_handlers
                .iter()
                .any(|(hid, _)| *hid == id);
            if subscribed {
                handler(&batch);
            }
        }

        batch.len()
    }

    /// Recompute visibility of every observed element and deliver one tick
    /// per observer that has entries.
    ///
    /// Returns the number of entries delivered.
    pub fn flush_visibility(&self) -> usize {
        let deliveries: Vec<(u64, VisibilityHandler, Vec<_>)> = {
            let mut guard = self.state.lock();
            let ids: Vec<u64> = guard.observers.keys().copied().collect();
            let mut deliveries = Vec::new();
            for id in ids {
                let Some(mut observer) = guard.observers.remove(&id) else {
                    continue;
                };
                let state: &DocumentState = &guard;
                let entries = observer.take_entries(|element| state.visible_fraction(element));
                let handler = observer.handler();
                guard.observers.insert(id, observer);
                if !entries.is_empty() {
                    deliveries.push((id, handler, entries));
                }
            }
            deliveries
        };

        let mut delivered = 0;
        for (id, handler, entries) in deliveries {
            let connected = self.state.lock().observers.contains_key(&id);
            if connected {
                debug!(observer = id, entries = entries.len(), "delivering visibility tick");
                delivered += entries.len();
                handler(&entries);
            }
        }
        delivered
    }

    /// Deliver mutations until the tree settles, then one visibility tick.
    pub fn flush(&self) {
        for _ in 0..MAX_FLUSH_ROUNDS {
            if self.flush_mutations() == 0 {
                break;
            }
        }
        self.flush_visibility();
    }

    /// Dispatch a click on `element`, bubbling to its ancestors.
    ///
    /// Detached elements still reach their own listeners. Returns the
    /// number of listeners invoked.
    pub fn click(&self, element: ElementId) -> Result<usize, HostError> {
        let path: Vec<(ElementId, Vec<ClickListener>)> = {
            let state = self.state.lock();
            state.node(element)?;
            let mut path = Vec::new();
            let mut current = Some(element);
            while let Some(node_id) = current {
                let listeners = state.listeners.get(&node_id).cloned().unwrap_or_default();
                path.push((node_id, listeners));
                current = state.node(node_id).ok().and_then(|n| n.parent);
            }
            path
        };

        let mut invoked = 0;
        for (current_target, listeners) in path {
            let event = ClickEvent {
                target: element,
                current_target,
            };
            for listener in listeners {
                // Listeners removed by an earlier listener are not called.
                if self.state.lock().has_listener(current_target, &listener) {
                    listener(&event);
                    invoked += 1;
                }
            }
        }
        Ok(invoked)
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn listener_count(&self, element: ElementId) -> usize {
        self.state
            .lock()
            .listeners
            .get(&element)
            .map_or(0, Vec::len)
    }

    pub fn total_listener_count(&self) -> usize {
        self.state.lock().listeners.values().map(Vec::len).sum()
    }

    pub fn mutation_subscriber_count(&self) -> usize {
        self.state.lock().mutation_handlers.len()
    }

    pub fn visibility_observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    /// Number of elements observed across all visibility observers.
    pub fn observed_count(&self) -> usize {
        self.state
            .lock()
            .observers
            .values()
            .map(ObserverState::target_count)
            .sum()
    }

    fn downgrade(&self) -> Weak<Mutex<DocumentState>> {
        Arc::downgrade(&self.state)
    }
}

impl HostDocument for HeadlessDocument {
    fn is_element(&self, node: ElementId) -> bool {
        self.state
            .lock()
            .node(node)
            .is_ok_and(Node::is_element)
    }

    fn has_attribute(&self, element: ElementId, name: &str) -> bool {
        self.state
            .lock()
            .node(element)
            .is_ok_and(|n| n.attribute(name).is_some())
    }

    fn get_attribute(&self, element: ElementId, name: &str) -> Option<String> {
        let state = self.state.lock();
        state
            .node(element)
            .ok()
            .and_then(|n| n.attribute(name).map(str::to_string))
    }

    fn query_marked(&self, scope: QueryScope, attribute: &str) -> Vec<ElementId> {
        let state = self.state.lock();
        let candidates = match scope {
            QueryScope::Document => {
                let mut all = vec![state.root];
                all.extend(state.descendants(state.root));
                all
            }
            QueryScope::DescendantsOf(node) => state.descendants(node),
        };

        candidates
            .into_iter()
            .filter(|id| state.node(*id).is_ok_and(|n| n.attribute(attribute).is_some()))
            .collect()
    }

    fn observe_mutations(&self, handler: MutationHandler) -> Subscription {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_handle();
            state.mutation_handlers.push((id, handler));
            id
        };

        let weak = self.downgrade();
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state.lock().mutation_handlers.retain(|(hid, _)| *hid != id);
            }
        })
    }

    fn create_visibility_observer(
        &self,
        threshold: f64,
        handler: VisibilityHandler,
    ) -> Box<dyn VisibilityObserver> {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_handle();
            state
                .observers
                .insert(id, ObserverState::new(threshold, handler));
            id
        };
        Box::new(HeadlessVisibilityObserver::new(id, self.downgrade()))
    }

    fn add_click_listener(&self, element: ElementId, listener: ClickListener) {
        let mut state = self.state.lock();
        let list = state.listeners.entry(element).or_default();
        if !list.iter().any(|l| same_listener(l, &listener)) {
            list.push(listener);
        }
    }

    fn remove_click_listener(&self, element: ElementId, listener: &ClickListener) -> bool {
        let mut state = self.state.lock();
        let Some(list) = state.listeners.get_mut(&element) else {
            return false;
        };
        let Some(position) = list.iter().position(|l| same_listener(l, listener)) else {
            return false;
        };
        list.remove(position);
        if list.is_empty() {
            state.listeners.remove(&element);
        }
        true
    }
}
