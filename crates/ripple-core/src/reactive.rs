//! Reactive properties
//!
//! [`define_reactive`] turns one key of an object into an accessor pair
//! backed by a private [`Dep`] and a cached value:
//!
//! - **read**: registers the active subscriber on the property, on the held
//!   container's observer, and (for arrays) on every nested observer;
//! - **write**: ignores unchanged values, stores the new one, observes it,
//!   and notifies.

use crate::config::diagnostics_enabled;
use crate::object::{Getter, Setter, Slot};
use crate::{config, dep, observe, observer_of, Array, Dep, Object, Observer, Value};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Hook run before a reactive property stores a new value
///
/// Only runs while diagnostics are enabled; intended for warnings such as
/// "this property should not be mutated directly".
pub type CustomSetter = Rc<dyn Fn(&Value)>;

/// State behind one reactive key
pub(crate) struct ReactiveProperty {
    dep: Dep,
    value: RefCell<Value>,
    getter: Option<Getter>,
    setter: Option<Setter>,
    custom_setter: Option<CustomSetter>,
    shallow: bool,
    child: RefCell<Option<Observer>>,
}

impl ReactiveProperty {
    /// Current value, read through the original getter if there was one
    fn current(&self) -> Value {
        match &self.getter {
            Some(getter) => getter(),
            None => self.value.borrow().clone(),
        }
    }

    pub(crate) fn get(&self) -> Value {
        let value = self.current();
        if dep::has_target() {
            self.dep.depend();
            let child = self.child.borrow().clone();
            if let Some(child) = child {
                child.dep().depend();
            }
            if let Value::Array(items) = &value {
                depend_array(items);
            }
        }
        value
    }

    pub(crate) fn set(&self, new_value: Value) {
        let old_value = self.current();
        if !has_changed(&old_value, &new_value) {
            return;
        }
        if let Some(hook) = &self.custom_setter {
            if diagnostics_enabled() {
                hook(&new_value);
            }
        }
        match &self.setter {
            Some(setter) => setter(new_value.clone()),
            None => {
                let _previous = self.value.replace(new_value.clone());
            }
        }
        let child = if self.shallow {
            None
        } else {
            observe(&new_value, false)
        };
        let _previous_child = self.child.replace(child);
        self.dep.notify();
    }
}

impl fmt::Debug for ReactiveProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveProperty")
            .field("dep", &self.dep)
            .field("shallow", &self.shallow)
            .finish_non_exhaustive()
    }
}

/// Whether writing `new` over `old` is a change
///
/// Uses `===` semantics (so `1` and `1.0` are the same number) with one
/// exception: NaN replacing NaN is not a change, so a property holding NaN
/// does not notify on every write.
///
/// ```
/// use ripple_core::{has_changed, Value};
///
/// assert!(!has_changed(&Value::Int(1), &Value::Int(1)));
/// assert!(!has_changed(&Value::Float(f64::NAN), &Value::Float(f64::NAN)));
/// assert!(!has_changed(&Value::Int(1), &Value::Float(1.0)));
/// assert!(has_changed(&Value::Int(1), &Value::from("1")));
/// ```
pub fn has_changed(old: &Value, new: &Value) -> bool {
    !(old == new || (old.is_nan() && new.is_nan()))
}

/// Make `key` of `object` reactive, starting from `value`
///
/// Keys whose current property is not configurable are left untouched. A
/// pre-existing accessor keeps working: its getter supplies reads and its
/// setter receives writes. With `shallow` the held value is not observed.
///
/// # Example
///
/// ```
/// use ripple_core::{define_reactive, evaluate, FnSubscriber, Object, Value};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let object = Object::new();
/// define_reactive(&object, "count", Value::Int(0), None, false);
///
/// let runs = Rc::new(Cell::new(0));
/// let sub = FnSubscriber::shared({
///     let runs = runs.clone();
///     move || runs.set(runs.get() + 1)
/// });
/// evaluate(&sub, || object.get("count"));
///
/// object.assign("count", 1i64);
/// object.assign("count", 1i64);
/// assert_eq!(runs.get(), 1);
/// ```
pub fn define_reactive(
    object: &Object,
    key: impl Into<String>,
    value: Value,
    custom_setter: Option<CustomSetter>,
    shallow: bool,
) {
    let key = key.into();
    let (getter, setter) = match object.slot(&key) {
        Some(slot) if !slot.is_configurable() => {
            tracing::debug!(container = %object.id(), key = %key, "skipping non-configurable property");
            return;
        }
        Some(Slot::Plain(descriptor)) => descriptor.accessors(),
        Some(Slot::Reactive { prop, .. }) => chain(prop),
        None => (None, None),
    };

    let shallow = shallow || !config().deep();
    let prop = Rc::new(ReactiveProperty {
        dep: Dep::new(),
        value: RefCell::new(value.clone()),
        getter,
        setter,
        custom_setter,
        shallow,
        child: RefCell::new(None),
    });

    if !object.install_reactive(key.clone(), prop.clone()) {
        tracing::debug!(container = %object.id(), key = %key, "cannot add property to non-extensible object");
        return;
    }
    if !shallow {
        let _previous = prop.child.replace(observe(&value, false));
    }
}

/// Route an existing reactive property through a new one
fn chain(prop: Rc<ReactiveProperty>) -> (Option<Getter>, Option<Setter>) {
    let getter: Getter = {
        let prop = prop.clone();
        Rc::new(move || prop.get())
    };
    let setter: Setter = Rc::new(move |value| prop.set(value));
    (Some(getter), Some(setter))
}

/// Register the active subscriber on every observer nested in `items`
///
/// Index reads cannot be intercepted, so a subscriber that reads an array
/// registers on each element's observer up front, recursing into nested
/// arrays. Arrays that contain themselves are visited once.
pub fn depend_array(items: &Array) {
    let mut visited = HashSet::new();
    depend_array_inner(items, &mut visited);
}

fn depend_array_inner(items: &Array, visited: &mut HashSet<crate::ContainerId>) {
    if !visited.insert(items.id()) {
        return;
    }
    for element in items.to_vec() {
        if let Some(observer) = observer_of(&element) {
            observer.dep().depend();
        }
        if let Value::Array(nested) = &element {
            depend_array_inner(nested, visited);
        }
    }
}
