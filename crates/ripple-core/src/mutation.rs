//! Explicit container mutation
//!
//! A key that did not exist when an object was observed has no reactive
//! accessor, so plain assignment cannot notify anyone about it; likewise an
//! index write on an array. [`set`] and [`del`] perform those mutations in a
//! way dependents can see.

use crate::config::diagnostics_enabled;
use crate::error::{Error, Result};
use crate::{define_reactive, observer_of, Array, Key, Object, Observer, Value};

/// Set `key` on `target`, adding it reactively if it does not exist
///
/// - Arrays: `key` must be a non-negative integer index. The array grows as
///   needed and the element is replaced through the instrumented `splice`,
///   so the new element is observed and the array's dependents notified.
/// - Objects with an existing `key`: plain assignment, which notifies
///   through the property's own accessor if it is reactive.
/// - Objects without `key`: refused on root data and internal instances;
///   added as a plain property on unobserved objects; otherwise installed as
///   a reactive property followed by a container-level notification.
///
/// Returns the value that was set. Errors only when `target` is not a
/// container, or `key` is not a valid index for an array.
///
/// # Example
///
/// ```
/// use ripple_core::{observe, set, Object, Value};
///
/// let data = Value::Object(Object::new());
/// observe(&data, false);
///
/// set(&data, "added", 1i64).unwrap();
/// assert!(data.as_object().unwrap().is_reactive("added"));
/// ```
pub fn set(target: &Value, key: impl Into<Key>, value: impl Into<Value>) -> Result<Value> {
    let key = key.into();
    let value = value.into();
    match target {
        Value::Array(array) => {
            let index = array_index(&key)?;
            set_index(array, index, value.clone());
            Ok(value)
        }
        Value::Object(object) => {
            set_key(object, key.into_name(), value.clone());
            Ok(value)
        }
        other => Err(Error::NotAContainer(other.type_name())),
    }
}

fn set_index(array: &Array, index: usize, value: Value) {
    if array.len() < index {
        array.set_len(index);
    }
    array.splice(index, 1, vec![value]);
}

fn set_key(object: &Object, key: String, value: Value) {
    if object.has_own(&key) {
        object.assign(key, value);
        return;
    }
    let observer = observer_of(&Value::Object(object.clone()));
    if rejects_key_change(object, observer.as_ref()) {
        if diagnostics_enabled() {
            tracing::warn!(
                container = %object.id(),
                key = %key,
                "avoid adding reactive properties to an internal instance or its root data at runtime; declare it upfront"
            );
        }
        return;
    }
    let Some(observer) = observer else {
        object.assign(key, value);
        return;
    };
    if !object.is_extensible() {
        tracing::debug!(container = %object.id(), key = %key, "cannot add property to non-extensible object");
        return;
    }
    define_reactive(object, key, value, None, false);
    observer.dep().notify();
}

/// Delete `key` from `target` and notify its dependents
///
/// - Arrays: `key` must be a non-negative integer index; the element is
///   removed through the instrumented `splice`.
/// - Objects: refused on root data and internal instances; a missing key is a
///   no-op. Otherwise the key is deleted and, if the object is observed, its
///   container-level dependents are notified.
///
/// Errors only when `target` is not a container, or `key` is not a valid
/// index for an array.
pub fn del(target: &Value, key: impl Into<Key>) -> Result<()> {
    let key = key.into();
    match target {
        Value::Array(array) => {
            let index = array_index(&key)?;
            array.splice(index, 1, Vec::new());
            Ok(())
        }
        Value::Object(object) => {
            del_key(object, &key.into_name());
            Ok(())
        }
        other => Err(Error::NotAContainer(other.type_name())),
    }
}

fn del_key(object: &Object, key: &str) {
    let observer = observer_of(&Value::Object(object.clone()));
    if rejects_key_change(object, observer.as_ref()) {
        if diagnostics_enabled() {
            tracing::warn!(
                container = %object.id(),
                key,
                "avoid deleting properties on an internal instance or its root data; set it to null instead"
            );
        }
        return;
    }
    if !object.has_own(key) {
        return;
    }
    if !object.remove(key) {
        tracing::debug!(container = %object.id(), key, "cannot delete non-configurable property");
        return;
    }
    if let Some(observer) = observer {
        observer.dep().notify();
    }
}

fn rejects_key_change(object: &Object, observer: Option<&Observer>) -> bool {
    object.is_internal() || observer.is_some_and(|o| o.root_count() > 0)
}

fn array_index(key: &Key) -> Result<usize> {
    key.as_array_index()
        .ok_or_else(|| Error::InvalidArrayIndex(key.to_string()))
}
