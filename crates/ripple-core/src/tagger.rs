//! Identity side table from containers to their observers
//!
//! Containers are never modified to carry their observer. Instead this
//! thread-local table maps a container's identity to its [`Observer`]. The
//! observer holds only a weak reference to its container, so the table keeps
//! nothing alive; a container removes its own entry when it is dropped.

use crate::value::ContainerId;
use crate::Observer;
use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static TAGS: RefCell<HashMap<ContainerId, Observer>> = RefCell::new(HashMap::new());
}

/// Find the observer of a live container
pub(crate) fn lookup(id: ContainerId) -> Option<Observer> {
    TAGS.with(|tags| {
        tags.borrow()
            .get(&id)
            .filter(|observer| observer.is_attached())
            .cloned()
    })
}

/// Record `observer` as the observer of `id`
pub(crate) fn tag(id: ContainerId, observer: Observer) {
    let _replaced = TAGS.with(|tags| tags.borrow_mut().insert(id, observer));
}

/// Remove the entry for `id`
///
/// Runs from container destructors, which may fire while the table is
/// busy or already torn down at thread exit; both cases are skipped.
pub(crate) fn forget(id: ContainerId) {
    let _removed = TAGS.try_with(|tags| {
        tags.try_borrow_mut()
            .ok()
            .and_then(|mut tags| tags.remove(&id))
    });
}

/// Number of containers currently tagged on this thread
pub fn tagged_count() -> usize {
    TAGS.with(|tags| tags.borrow().len())
}
