//! Ordered containers with instrumented mutation
//!
//! Element access by index cannot register dependencies the way a named
//! property read does, so arrays take a different route: every mutating
//! operation (`push`, `pop`, `shift`, `unshift`, `splice`, `sort`, `reverse`)
//! checks whether the array has an observer, and if so observes any newly
//! inserted elements and notifies the observer's dependency set.
//! Unobserved arrays behave as plain lists.

use crate::value::ContainerId;
use crate::{config, observe, tagger, Value};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};

/// A shared, ordered container
///
/// Cloning an `Array` yields another handle to the same container.
///
/// # Example
///
/// ```
/// use ripple_core::{observe, Array, Value};
///
/// let array = Array::from_values(vec![Value::Int(1), Value::Int(2)]);
/// let observer = observe(&Value::Array(array.clone()), false).unwrap();
///
/// array.push(3i64);
/// assert_eq!(array.len(), 3);
/// assert_eq!(observer.dep().subscriber_count(), 0);
/// ```
#[derive(Clone)]
pub struct Array {
    inner: Rc<ArrayInner>,
}

struct ArrayInner {
    items: RefCell<Vec<Value>>,
    frozen: Cell<bool>,
    internal: Cell<bool>,
}

impl Drop for ArrayInner {
    fn drop(&mut self) {
        tagger::forget(ContainerId(self as *const ArrayInner as *const () as usize));
    }
}

/// Non-owning handle to an [`Array`]
#[derive(Clone)]
pub(crate) struct WeakArray(Weak<ArrayInner>);

impl WeakArray {
    pub(crate) fn upgrade(&self) -> Option<Array> {
        self.0.upgrade().map(|inner| Array { inner })
    }
}

impl Array {
    /// Largest length an array may reach
    pub const MAX_LEN: usize = u32::MAX as usize;

    /// Largest valid index
    pub const MAX_INDEX: usize = Self::MAX_LEN - 1;

    /// Create an empty array
    pub fn new() -> Self {
        Self::from_values(Vec::new())
    }

    /// Create an array holding `items`
    pub fn from_values(items: Vec<Value>) -> Self {
        Self {
            inner: Rc::new(ArrayInner {
                items: RefCell::new(items),
                frozen: Cell::new(false),
                internal: Cell::new(false),
            }),
        }
    }

    /// Get the identity of this array
    pub fn id(&self) -> ContainerId {
        ContainerId(Rc::as_ptr(&self.inner) as *const () as usize)
    }

    /// Check whether two handles refer to the same array
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakArray {
        WeakArray(Rc::downgrade(&self.inner))
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    /// Check whether the array is empty
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Get the element at `index`
    ///
    /// Index reads are not tracked; dependents register on the array as a
    /// whole when they read the property holding it.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Copy out the current elements
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

    /// Write the element at `index`, as `array[index] = value` would
    ///
    /// This is the raw write: it is not observed and does not notify. Writing
    /// past the end pads with nulls; indices above [`Array::MAX_INDEX`] are
    /// ignored. Use [`set`](crate::set) to notify.
    pub fn assign(&self, index: usize, value: impl Into<Value>) {
        if self.rejects_mutation("assign") {
            return;
        }
        let Some(len) = index.checked_add(1).filter(|len| *len <= Self::MAX_LEN) else {
            tracing::debug!(array = %self.id(), index, "ignoring write past the maximum array length");
            return;
        };
        let _previous = {
            let mut items = self.inner.items.borrow_mut();
            if index >= items.len() {
                items.resize(len, Value::Null);
            }
            std::mem::replace(&mut items[index], value.into())
        };
    }

    /// Set the length, as `array.length = len` would
    ///
    /// Truncates or pads with nulls. Not instrumented.
    pub fn set_len(&self, len: usize) {
        if self.rejects_mutation("set_len") {
            return;
        }
        if len > Self::MAX_LEN {
            tracing::debug!(array = %self.id(), len, "ignoring length above the maximum array length");
            return;
        }
        let _removed: Vec<Value> = {
            let mut items = self.inner.items.borrow_mut();
            if len < items.len() {
                items.split_off(len)
            } else {
                items.resize(len, Value::Null);
                Vec::new()
            }
        };
    }

    /// Append an element, returning the new length
    pub fn push(&self, value: impl Into<Value>) -> usize {
        if self.rejects_mutation("push") {
            return self.len();
        }
        let value = value.into();
        let len = {
            let mut items = self.inner.items.borrow_mut();
            items.push(value.clone());
            items.len()
        };
        self.after_mutation(std::slice::from_ref(&value));
        len
    }

    /// Remove and return the last element
    pub fn pop(&self) -> Option<Value> {
        if self.rejects_mutation("pop") {
            return None;
        }
        let removed = self.inner.items.borrow_mut().pop();
        self.after_mutation(&[]);
        removed
    }

    /// Remove and return the first element
    pub fn shift(&self) -> Option<Value> {
        if self.rejects_mutation("shift") {
            return None;
        }
        let removed = {
            let mut items = self.inner.items.borrow_mut();
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        };
        self.after_mutation(&[]);
        removed
    }

    /// Prepend an element, returning the new length
    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        if self.rejects_mutation("unshift") {
            return self.len();
        }
        let value = value.into();
        let len = {
            let mut items = self.inner.items.borrow_mut();
            items.insert(0, value.clone());
            items.len()
        };
        self.after_mutation(std::slice::from_ref(&value));
        len
    }

    /// Remove `delete_count` elements starting at `start` and insert `items`
    /// in their place, returning the removed elements
    ///
    /// `start` and `delete_count` are clamped to the array bounds.
    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Vec<Value> {
        if self.rejects_mutation("splice") {
            return Vec::new();
        }
        let removed = {
            let mut current = self.inner.items.borrow_mut();
            let start = start.min(current.len());
            let end = start.saturating_add(delete_count).min(current.len());
            let removed: Vec<Value> = current.splice(start..end, items.iter().cloned()).collect();
            removed
        };
        self.after_mutation(&items);
        removed
    }

    /// Sort with [`Value::total_cmp`]
    pub fn sort(&self) {
        self.sort_by(Value::total_cmp);
    }

    /// Sort with a comparator
    ///
    /// The elements are moved out while `compare` runs, so the comparator
    /// observes this array as empty.
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) {
        if self.rejects_mutation("sort") {
            return;
        }
        let mut items = std::mem::take(&mut *self.inner.items.borrow_mut());
        items.sort_by(compare);
        let _emptied = std::mem::replace(&mut *self.inner.items.borrow_mut(), items);
        self.after_mutation(&[]);
    }

    /// Reverse the elements in place
    pub fn reverse(&self) {
        if self.rejects_mutation("reverse") {
            return;
        }
        self.inner.items.borrow_mut().reverse();
        self.after_mutation(&[]);
    }

    /// Forbid every further mutation
    pub fn freeze(&self) {
        self.inner.frozen.set(true);
    }

    /// Check whether the array may still be mutated
    pub fn is_extensible(&self) -> bool {
        !self.inner.frozen.get()
    }

    /// Mark this array as an internal framework instance, which is never observed
    pub fn mark_internal(&self) {
        self.inner.internal.set(true);
    }

    /// Check whether this array is an internal instance
    pub fn is_internal(&self) -> bool {
        self.inner.internal.get()
    }

    fn rejects_mutation(&self, op: &'static str) -> bool {
        let frozen = self.inner.frozen.get();
        if frozen {
            tracing::debug!(array = %self.id(), op, "ignoring mutation of frozen array");
        }
        frozen
    }

    fn after_mutation(&self, inserted: &[Value]) {
        let Some(observer) = tagger::lookup(self.id()) else {
            return;
        };
        if config().deep() {
            for value in inserted {
                observe(value, false);
            }
        }
        observer.dep().notify();
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("id", &self.id())
            .field("len", &self.len())
            .finish()
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Array::from_values(iter.into_iter().map(Into::into).collect())
    }
}
