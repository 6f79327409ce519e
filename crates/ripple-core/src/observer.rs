//! Per-container observers
//!
//! [`observe`] attaches an [`Observer`] to a container the first time it is
//! seen. Attaching an object converts each of its enumerable keys into a
//! reactive property; attaching an array observes each element and arms the
//! array's instrumented mutators. Either way the observer's own [`Dep`]
//! stands for "this container as a whole changed": keys added or removed
//! through [`set`](crate::set) / [`del`](crate::del), or an array mutation.

use crate::array::WeakArray;
use crate::object::WeakObject;
use crate::{config, define_reactive, should_convert, tagger, Array, Dep, Object, Value};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Bookkeeping attached to one observed container
///
/// Cloning an `Observer` yields another handle to the same observer.
#[derive(Clone)]
pub struct Observer {
    inner: Rc<ObserverInner>,
}

struct ObserverInner {
    dep: Dep,
    /// Number of owners using the container as their root data
    root_count: Cell<usize>,
    container: WeakContainer,
}

#[derive(Clone)]
enum WeakContainer {
    Object(WeakObject),
    Array(WeakArray),
}

impl Observer {
    fn new(container: WeakContainer) -> Self {
        Self {
            inner: Rc::new(ObserverInner {
                dep: Dep::new(),
                root_count: Cell::new(0),
                container,
            }),
        }
    }

    fn for_object(object: &Object) -> Self {
        let observer = Self::new(WeakContainer::Object(object.downgrade()));
        // Tag before walking so cycles back to this object find the observer
        tagger::tag(object.id(), observer.clone());
        tracing::trace!(container = %object.id(), dep = %observer.dep().id(), "observing object");

        for (key, value) in object.entries_untracked() {
            define_reactive(object, key, value, None, false);
        }
        observer
    }

    fn for_array(array: &Array) -> Self {
        let observer = Self::new(WeakContainer::Array(array.downgrade()));
        tagger::tag(array.id(), observer.clone());
        tracing::trace!(container = %array.id(), dep = %observer.dep().id(), "observing array");

        if config().deep() {
            for item in array.to_vec() {
                observe(&item, false);
            }
        }
        observer
    }

    /// Dependency set notified when the container as a whole changes
    pub fn dep(&self) -> &Dep {
        &self.inner.dep
    }

    /// Number of owners using this container as their root data
    pub fn root_count(&self) -> usize {
        self.inner.root_count.get()
    }

    /// The observed container, if it is still alive
    pub fn value(&self) -> Option<Value> {
        match &self.inner.container {
            WeakContainer::Object(object) => object.upgrade().map(Value::Object),
            WeakContainer::Array(array) => array.upgrade().map(Value::Array),
        }
    }

    /// Check whether two handles refer to the same observer
    pub fn ptr_eq(&self, other: &Observer) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn is_attached(&self) -> bool {
        match &self.inner.container {
            WeakContainer::Object(object) => object.upgrade().is_some(),
            WeakContainer::Array(array) => array.upgrade().is_some(),
        }
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("dep", &self.inner.dep)
            .field("root_count", &self.root_count())
            .finish()
    }
}

/// Get the observer of `value`, creating one if allowed
///
/// Returns the existing observer for an already-observed container.
/// Otherwise an observer is created only for an extensible, non-internal
/// container while conversion is enabled; in every other case (scalars,
/// frozen or internal containers, conversion disabled) the result is `None`,
/// which simply means the value is not reactive.
///
/// With `as_root_data` the observer's root count is incremented, which
/// stops [`set`](crate::set) and [`del`](crate::del) from adding or removing
/// keys on the container.
///
/// # Example
///
/// ```
/// use ripple_core::{observe, Object, Value};
///
/// let data = Value::Object(Object::new());
/// let first = observe(&data, true).unwrap();
/// let second = observe(&data, false).unwrap();
///
/// assert!(first.ptr_eq(&second));
/// assert_eq!(first.root_count(), 1);
/// assert!(observe(&Value::Int(1), false).is_none());
/// ```
pub fn observe(value: &Value, as_root_data: bool) -> Option<Observer> {
    let id = value.container_id()?;
    let observer = match tagger::lookup(id) {
        Some(existing) => existing,
        None => {
            if !should_convert() {
                return None;
            }
            match value {
                Value::Object(object) if object.is_extensible() && !object.is_internal() => {
                    Observer::for_object(object)
                }
                Value::Array(array) if array.is_extensible() && !array.is_internal() => {
                    Observer::for_array(array)
                }
                _ => return None,
            }
        }
    };
    if as_root_data {
        observer
            .inner
            .root_count
            .set(observer.inner.root_count.get() + 1);
    }
    Some(observer)
}

/// Get the observer of `value` without creating one
pub fn observer_of(value: &Value) -> Option<Observer> {
    value.container_id().and_then(tagger::lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tagged_count, without_conversion, with_config, ReactiveConfig};

    #[test]
    fn test_observe_is_idempotent() {
        let data = Value::Object([("a", 1i64)].into_iter().collect());
        let first = observe(&data, false).unwrap();
        let second = observe(&data, false).unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(tagged_count(), 1);
    }

    #[test]
    fn test_observe_scalars_returns_none() {
        assert!(observe(&Value::Null, false).is_none());
        assert!(observe(&Value::Int(3), true).is_none());
        assert!(observe(&Value::from("x"), false).is_none());
    }

    #[test]
    fn test_observe_skips_frozen_and_internal() {
        let frozen = Object::new();
        frozen.freeze();
        assert!(observe(&Value::Object(frozen), false).is_none());

        let internal = Object::new();
        internal.mark_internal();
        assert!(observe(&Value::Object(internal), false).is_none());

        let frozen_list = Array::new();
        frozen_list.freeze();
        assert!(observe(&Value::Array(frozen_list), false).is_none());
    }

    #[test]
    fn test_conversion_disabled() {
        let data = Value::Object(Object::new());
        assert!(without_conversion(|| observe(&data, false)).is_none());

        // Existing observers are still returned while conversion is off
        let observer = observe(&data, false).unwrap();
        let again = without_conversion(|| observe(&data, false)).unwrap();
        assert!(observer.ptr_eq(&again));
    }

    #[test]
    fn test_root_count() {
        let data = Value::Object(Object::new());
        observe(&data, true);
        let observer = observe(&data, true).unwrap();
        assert_eq!(observer.root_count(), 2);
    }

    #[test]
    fn test_walk_makes_keys_reactive_recursively() {
        let inner = Object::new();
        inner.assign("x", 1i64);
        let list: Array = [Value::Object(Object::new())].into_iter().collect();
        let outer = Object::new();
        outer.assign("inner", inner.clone());
        outer.assign("list", list.clone());

        observe(&Value::Object(outer.clone()), false);

        assert!(outer.is_reactive("inner"));
        assert!(outer.is_reactive("list"));
        assert!(inner.is_reactive("x"));
        assert!(observer_of(&Value::Array(list.clone())).is_some());
        assert!(observer_of(&list.get(0).unwrap()).is_some());
    }

    #[test]
    fn test_shallow_config_observes_top_level_only() {
        let inner = Object::new();
        let outer = Object::new();
        outer.assign("inner", inner.clone());

        with_config(ReactiveConfig::default().with_deep(false), || {
            observe(&Value::Object(outer.clone()), false);
        });

        assert!(outer.is_reactive("inner"));
        assert!(observer_of(&Value::Object(inner)).is_none());
    }

    #[test]
    fn test_cyclic_object_observed_once() {
        let a = Object::new();
        let b = Object::new();
        a.assign("b", b.clone());
        b.assign("a", a.clone());
        a.assign("me", a.clone());

        let observer = observe(&Value::Object(a.clone()), false).unwrap();
        assert!(observer_of(&Value::Object(b.clone())).is_some());
        assert_eq!(tagged_count(), 2);
        assert!(observer.value().is_some());

        // Break the cycles so both objects are released
        a.remove("b");
        a.remove("me");
    }

    #[test]
    fn test_observer_value_and_detach() {
        let data = Value::Array(Array::new());
        let observer = observe(&data, false).unwrap();
        assert_eq!(observer.value(), Some(data.clone()));

        drop(data);
        assert!(observer.value().is_none());
        assert!(!observer.is_attached());
        assert_eq!(tagged_count(), 0);
    }
}
