//! Lifecycle registry.
//!
//! The authoritative map from a live element to its registration handle.
//! Registration is two-phase: a slot is reserved before the trackers are
//! called and committed afterwards. A slot released in between (by a
//! nested unregister) makes the commit fail, and the caller rolls back.

use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use barebone_protocols::{ClickListener, ElementId};

/// What was attached to one element.
#[derive(Clone)]
pub struct RegistrationHandle {
    pub element: ElementId,
    /// The exact listener instance attached to the element.
    pub listener: ClickListener,
    /// Whether this registration started the visibility watch.
    pub visibility_watched: bool,
    pub registered_at: DateTime<Utc>,
}

impl RegistrationHandle {
    pub fn new(element: ElementId, listener: ClickListener, visibility_watched: bool) -> Self {
        Self {
            element,
            listener,
            visibility_watched,
            registered_at: Utc::now(),
        }
    }
}

impl fmt::Debug for RegistrationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationHandle")
            .field("element", &self.element)
            .field("visibility_watched", &self.visibility_watched)
            .field("registered_at", &self.registered_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Pending,
    Active(RegistrationHandle),
}

/// Element to registration-handle map.
///
/// No map reference is ever held across a call out of this type.
#[derive(Default)]
pub struct LifecycleRegistry {
    slots: DashMap<ElementId, Slot>,
}

impl LifecycleRegistry {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Reserve a slot. Returns `false` if the element already has one,
    /// pending or active.
    pub fn reserve(&self, element: ElementId) -> bool {
        match self.slots.entry(element) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::Pending);
                true
            }
        }
    }

    /// Fill a reserved slot.
    ///
    /// Gives the handle back when the reservation was released in the
    /// meantime or the slot is already active.
    pub fn commit(&self, handle: RegistrationHandle) -> Result<(), RegistrationHandle> {
        match self.slots.get_mut(&handle.element) {
            Some(mut slot) if matches!(*slot, Slot::Pending) => {
                *slot = Slot::Active(handle);
                Ok(())
            }
            _ => Err(handle),
        }
    }

    /// Drop the slot, pending or active. Returns whether one existed.
    pub fn release(&self, element: ElementId) -> bool {
        self.slots.remove(&element).is_some()
    }

    pub fn contains(&self, element: ElementId) -> bool {
        self.slots.contains_key(&element)
    }

    /// Whether the element has a committed registration.
    pub fn is_active(&self, element: ElementId) -> bool {
        self.slots
            .get(&element)
            .is_some_and(|slot| matches!(*slot, Slot::Active(_)))
    }

    /// Committed handle of an element.
    pub fn handle(&self, element: ElementId) -> Option<RegistrationHandle> {
        self.slots.get(&element).and_then(|slot| match &*slot {
            Slot::Active(handle) => Some(handle.clone()),
            Slot::Pending => None,
        })
    }

    /// Snapshot of every element with a slot, sorted by id.
    pub fn elements(&self) -> Vec<ElementId> {
        let mut elements: Vec<ElementId> = self.slots.iter().map(|entry| *entry.key()).collect();
        elements.sort();
        elements
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
