// Element arena - the single store of element records
//
// Every panel holds id lists into this arena instead of owning element
// copies. A label write is therefore visible to every panel displaying the
// element the moment it happens; there is no propagation step and no window
// in which two views of the same element disagree.

use crate::elements::{Element, Label};
use std::collections::HashMap;

/// Id-indexed store of all elements fetched in the current session
#[derive(Debug, Default)]
pub struct ElementArena {
    elements: HashMap<String, Element>,
}

impl ElementArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh an element from a fetch. Server data wins: a fetch
    /// response reflects every mutation the server has accepted, so the
    /// stored record is replaced wholesale. The caller is responsible for
    /// elements with an unresolved label write, whose fetched label may
    /// predate the PUT.
    pub fn upsert(&mut self, element: Element) {
        self.elements.insert(element.id.clone(), element);
    }

    pub fn get(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Set an element's user label, returning the previous value.
    /// Unknown ids are a no-op (the element was evicted by a refetch).
    pub fn set_label(&mut self, id: &str, label: Label) -> Option<Label> {
        self.elements.get_mut(id).map(|e| {
            let prev = e.user_label;
            e.user_label = label;
            prev
        })
    }

    pub fn label_of(&self, id: &str) -> Option<Label> {
        self.elements.get(id).map(|e| e.user_label)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Drop everything. Called on workspace/category teardown so per-category
    /// label projections from the old category cannot leak into the new one.
    pub fn clear(&mut self) {
        self.elements.clear();
    }
}
