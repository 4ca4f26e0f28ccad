//! Host document contract.
//!
//! The tracker never owns the UI tree. It reads attributes, enumerates
//! marked elements, and subscribes to the three kinds of notification a
//! host delivers: structural mutations, visibility ticks and clicks.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::subscription::Subscription;

/// Identity of a node in the host tree.
///
/// Two ids are equal only when they name the same node. Text nodes also
/// carry ids; use [`HostDocument::is_element`] to tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(u64);

impl ElementId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One structural change reported in a mutation batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Parent whose child list changed.
    pub target: ElementId,
    /// Nodes inserted under `target`.
    pub added_nodes: Vec<ElementId>,
    /// Nodes removed from `target`. Their subtrees stay queryable.
    pub removed_nodes: Vec<ElementId>,
}

impl MutationRecord {
    pub fn added(target: ElementId, node: ElementId) -> Self {
        Self {
            target,
            added_nodes: vec![node],
            removed_nodes: Vec::new(),
        }
    }

    pub fn removed(target: ElementId, node: ElementId) -> Self {
        Self {
            target,
            added_nodes: Vec::new(),
            removed_nodes: vec![node],
        }
    }
}

/// One element's entry in a visibility tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityEntry {
    pub target: ElementId,
    /// Whether any part of the element is inside the viewport.
    pub is_intersecting: bool,
    /// Visible area divided by the element's bounding area, in `[0, 1]`.
    pub intersection_ratio: f64,
}

/// Click delivered to a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickEvent {
    /// Node the click originated on.
    pub target: ElementId,
    /// Node the listener is attached to.
    pub current_target: ElementId,
}

/// Where to look for marked elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScope {
    /// Every element connected to the document.
    Document,
    /// Descendants of the given node, excluding the node itself. Works on
    /// detached subtrees too.
    DescendantsOf(ElementId),
}

pub type MutationHandler = Arc<dyn Fn(&[MutationRecord]) + Send + Sync>;
pub type VisibilityHandler = Arc<dyn Fn(&[VisibilityEntry]) + Send + Sync>;
pub type ClickListener = Arc<dyn Fn(&ClickEvent) + Send + Sync>;

/// Listener identity: two listeners are the same only if they are the same
/// allocation. Structurally equal closures are different listeners.
pub fn same_listener(a: &ClickListener, b: &ClickListener) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Visibility observer created by the host for one threshold.
pub trait VisibilityObserver: Send + Sync {
    /// Start observing an element. Observing twice is a no-op.
    fn observe(&self, element: ElementId);

    /// Stop observing an element. Unknown elements are ignored.
    fn unobserve(&self, element: ElementId);

    /// Stop observing everything. No tick is delivered afterwards.
    fn disconnect(&self);
}

/// The hosting UI tree.
///
/// Implementations must not hold internal locks while invoking handlers or
/// listeners: handlers call back into the document.
pub trait HostDocument: Send + Sync {
    /// Whether the node is an element (as opposed to text).
    fn is_element(&self, node: ElementId) -> bool;

    fn has_attribute(&self, element: ElementId, name: &str) -> bool;

    fn get_attribute(&self, element: ElementId, name: &str) -> Option<String>;

    /// Elements in `scope` carrying the attribute, in document order.
    fn query_marked(&self, scope: QueryScope, attribute: &str) -> Vec<ElementId>;

    /// Subscribe to structural mutations of the whole document subtree.
    fn observe_mutations(&self, handler: MutationHandler) -> Subscription;

    /// Create an observer reporting visibility-fraction crossings of `threshold`.
    fn create_visibility_observer(
        &self,
        threshold: f64,
        handler: VisibilityHandler,
    ) -> Box<dyn VisibilityObserver>;

    /// Attach a click listener. Attaching the same listener twice is a no-op.
    fn add_click_listener(&self, element: ElementId, listener: ClickListener);

    /// Detach exactly `listener` (matched with [`same_listener`]).
    ///
    /// Returns whether a listener was removed.
    fn remove_click_listener(&self, element: ElementId, listener: &ClickListener) -> bool;
}
