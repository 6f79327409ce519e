//! Keyed containers
//!
//! An [`Object`] is a shared, ordered map from names to *slots*. A slot is
//! either a plain property (a data value or a getter/setter pair, described by
//! a [`PropertyDescriptor`]) or a reactive property installed by
//! [`define_reactive`](crate::define_reactive). Reads and writes go through
//! [`Object::get`] and [`Object::assign`], which is where reactive properties
//! intercept them.

use crate::reactive::ReactiveProperty;
use crate::value::ContainerId;
use crate::{tagger, untracked, Value};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Getter of an accessor property
pub type Getter = Rc<dyn Fn() -> Value>;

/// Setter of an accessor property
pub type Setter = Rc<dyn Fn(Value)>;

/// How a plain property stores its value
#[derive(Clone)]
pub(crate) enum DescriptorKind {
    Data { value: Value, writable: bool },
    Accessor { get: Option<Getter>, set: Option<Setter> },
}

/// Description of a plain (non-reactive) property
///
/// # Example
///
/// ```
/// use ripple_core::{Object, PropertyDescriptor, Value};
///
/// let object = Object::new();
/// object.define_property("id", PropertyDescriptor::data(7i64).configurable(false));
/// object.define_property("answer", PropertyDescriptor::getter(|| Value::Int(42)));
///
/// assert_eq!(object.get("id"), Some(Value::Int(7)));
/// assert_eq!(object.get("answer"), Some(Value::Int(42)));
/// ```
#[derive(Clone)]
pub struct PropertyDescriptor {
    pub(crate) kind: DescriptorKind,
    pub(crate) enumerable: bool,
    pub(crate) configurable: bool,
}

impl PropertyDescriptor {
    /// A writable, enumerable, configurable data property
    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            kind: DescriptorKind::Data {
                value: value.into(),
                writable: true,
            },
            enumerable: true,
            configurable: true,
        }
    }

    /// An enumerable, configurable accessor property with only a getter
    pub fn getter(get: impl Fn() -> Value + 'static) -> Self {
        Self {
            kind: DescriptorKind::Accessor {
                get: Some(Rc::new(get)),
                set: None,
            },
            enumerable: true,
            configurable: true,
        }
    }

    /// Add a setter to an accessor property
    ///
    /// Turns a data property into an accessor without a getter.
    pub fn with_setter(mut self, set: impl Fn(Value) + 'static) -> Self {
        let set: Setter = Rc::new(set);
        self.kind = match self.kind {
            DescriptorKind::Accessor { get, .. } => DescriptorKind::Accessor { get, set: Some(set) },
            DescriptorKind::Data { .. } => DescriptorKind::Accessor {
                get: None,
                set: Some(set),
            },
        };
        self
    }

    /// Set whether the property may be redefined or deleted
    pub fn configurable(mut self, configurable: bool) -> Self {
        self.configurable = configurable;
        self
    }

    /// Set whether the property is listed by [`Object::keys`]
    pub fn enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = enumerable;
        self
    }

    /// Set whether a data property accepts assignment
    pub fn writable(mut self, writable: bool) -> Self {
        if let DescriptorKind::Data { writable: w, .. } = &mut self.kind {
            *w = writable;
        }
        self
    }

    /// Check whether the property may be redefined or deleted
    pub fn is_configurable(&self) -> bool {
        self.configurable
    }

    /// Check whether the property is enumerable
    pub fn is_enumerable(&self) -> bool {
        self.enumerable
    }

    /// Getter and setter of an accessor property
    pub(crate) fn accessors(&self) -> (Option<Getter>, Option<Setter>) {
        match &self.kind {
            DescriptorKind::Accessor { get, set } => (get.clone(), set.clone()),
            DescriptorKind::Data { .. } => (None, None),
        }
    }

    fn read(&self) -> Value {
        match &self.kind {
            DescriptorKind::Data { value, .. } => value.clone(),
            DescriptorKind::Accessor { get: Some(get), .. } => get(),
            DescriptorKind::Accessor { get: None, .. } => Value::Null,
        }
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("PropertyDescriptor");
        match &self.kind {
            DescriptorKind::Data { value, writable } => {
                s.field("value", value).field("writable", writable);
            }
            DescriptorKind::Accessor { get, set } => {
                s.field("get", &get.is_some()).field("set", &set.is_some());
            }
        }
        s.field("enumerable", &self.enumerable)
            .field("configurable", &self.configurable)
            .finish()
    }
}

#[derive(Clone)]
pub(crate) enum Slot {
    Plain(PropertyDescriptor),
    Reactive {
        prop: Rc<ReactiveProperty>,
        configurable: bool,
    },
}

impl Slot {
    pub(crate) fn is_configurable(&self) -> bool {
        match self {
            Slot::Plain(desc) => desc.configurable,
            Slot::Reactive { configurable, .. } => *configurable,
        }
    }

    fn is_enumerable(&self) -> bool {
        match self {
            Slot::Plain(desc) => desc.enumerable,
            Slot::Reactive { .. } => true,
        }
    }

    fn read(&self) -> Value {
        match self {
            Slot::Plain(desc) => desc.read(),
            Slot::Reactive { prop, .. } => prop.get(),
        }
    }
}

/// A shared, ordered, keyed container
///
/// Cloning an `Object` yields another handle to the same container.
#[derive(Clone)]
pub struct Object {
    inner: Rc<ObjectInner>,
}

struct ObjectInner {
    slots: RefCell<IndexMap<String, Slot>>,
    extensible: Cell<bool>,
    internal: Cell<bool>,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        tagger::forget(ContainerId(self as *const ObjectInner as *const () as usize));
    }
}

/// Non-owning handle to an [`Object`]
#[derive(Clone)]
pub(crate) struct WeakObject(Weak<ObjectInner>);

impl WeakObject {
    pub(crate) fn upgrade(&self) -> Option<Object> {
        self.0.upgrade().map(|inner| Object { inner })
    }
}

impl Object {
    /// Create an empty, extensible object
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                slots: RefCell::new(IndexMap::new()),
                extensible: Cell::new(true),
                internal: Cell::new(false),
            }),
        }
    }

    /// Get the identity of this object
    pub fn id(&self) -> ContainerId {
        ContainerId(Rc::as_ptr(&self.inner) as *const () as usize)
    }

    /// Check whether two handles refer to the same object
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.inner))
    }

    pub(crate) fn slot(&self, key: &str) -> Option<Slot> {
        self.inner.slots.borrow().get(key).cloned()
    }

    /// Read a property
    ///
    /// Reading a reactive property registers the active subscriber on it.
    /// Returns `None` when the key is not an own property.
    pub fn get(&self, key: &str) -> Option<Value> {
        let slot = self.slot(key)?;
        Some(slot.read())
    }

    /// Read a property without registering any dependency
    pub fn get_untracked(&self, key: &str) -> Option<Value> {
        untracked(|| self.get(key))
    }

    /// Assign a property, as `object[key] = value` would
    ///
    /// Reactive properties run their write path and notify. Accessor
    /// properties call their setter (and ignore the write without one).
    /// Read-only data properties ignore the write. A key that does not exist
    /// yet is added as a plain, non-reactive property if the object is
    /// extensible; use [`set`](crate::set) to add a reactive key.
    pub fn assign(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.slot(&key) {
            Some(Slot::Reactive { prop, .. }) => prop.set(value),
            Some(Slot::Plain(desc)) => match desc.kind {
                DescriptorKind::Accessor { set: Some(set), .. } => set(value),
                DescriptorKind::Accessor { set: None, .. } => {}
                DescriptorKind::Data { writable: true, .. } => {
                    let _previous = self.write_data(&key, value);
                }
                DescriptorKind::Data { writable: false, .. } => {}
            },
            None => {
                if self.is_extensible() {
                    self.inner
                        .slots
                        .borrow_mut()
                        .insert(key, Slot::Plain(PropertyDescriptor::data(value)));
                }
            }
        }
    }

    fn write_data(&self, key: &str, value: Value) -> Option<Value> {
        let mut slots = self.inner.slots.borrow_mut();
        match slots.get_mut(key) {
            Some(Slot::Plain(PropertyDescriptor {
                kind: DescriptorKind::Data { value: current, .. },
                ..
            })) => Some(std::mem::replace(current, value)),
            _ => None,
        }
    }

    /// Define or redefine a plain property
    ///
    /// Fails (returns `false`) when the existing property is not
    /// configurable, or when the key is new and the object is not extensible.
    /// Redefining a reactive property replaces it with the plain one.
    pub fn define_property(&self, key: impl Into<String>, descriptor: PropertyDescriptor) -> bool {
        let key = key.into();
        let mut slots = self.inner.slots.borrow_mut();
        match slots.get(&key) {
            Some(slot) if !slot.is_configurable() => return false,
            None if !self.inner.extensible.get() => return false,
            _ => {}
        }
        let _previous = slots.insert(key, Slot::Plain(descriptor));
        true
    }

    /// Install a reactive slot, replacing any configurable slot for `key`
    pub(crate) fn install_reactive(&self, key: String, prop: Rc<ReactiveProperty>) -> bool {
        let mut slots = self.inner.slots.borrow_mut();
        match slots.get(&key) {
            Some(slot) if !slot.is_configurable() => return false,
            None if !self.inner.extensible.get() => return false,
            _ => {}
        }
        let _previous = slots.insert(
            key,
            Slot::Reactive {
                prop,
                configurable: true,
            },
        );
        true
    }

    /// Delete an own property, as `delete object[key]` would
    ///
    /// Returns `false` if the key is absent or not configurable. This is the
    /// raw operation: it does not notify. Use [`del`](crate::del) to notify.
    pub fn remove(&self, key: &str) -> bool {
        let removed = {
            let mut slots = self.inner.slots.borrow_mut();
            match slots.get(key) {
                Some(slot) if slot.is_configurable() => slots.shift_remove(key),
                _ => None,
            }
        };
        removed.is_some()
    }

    /// Check whether `key` is an own property
    pub fn has_own(&self, key: &str) -> bool {
        self.inner.slots.borrow().contains_key(key)
    }

    /// Check whether `key` is backed by a reactive property
    pub fn is_reactive(&self, key: &str) -> bool {
        matches!(self.inner.slots.borrow().get(key), Some(Slot::Reactive { .. }))
    }

    /// Enumerable own keys, in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .slots
            .borrow()
            .iter()
            .filter(|(_, slot)| slot.is_enumerable())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Enumerable own keys with their current values, read untracked
    pub fn entries_untracked(&self) -> Vec<(String, Value)> {
        let slots: Vec<(String, Slot)> = self
            .inner
            .slots
            .borrow()
            .iter()
            .filter(|(_, slot)| slot.is_enumerable())
            .map(|(key, slot)| (key.clone(), slot.clone()))
            .collect();
        untracked(|| {
            slots
                .into_iter()
                .map(|(key, slot)| {
                    let value = slot.read();
                    (key, value)
                })
                .collect()
        })
    }

    /// Number of own properties
    pub fn len(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    /// Check whether the object has no own properties
    pub fn is_empty(&self) -> bool {
        self.inner.slots.borrow().is_empty()
    }

    /// Forbid adding new properties
    pub fn prevent_extensions(&self) {
        self.inner.extensible.set(false);
    }

    /// Forbid adding properties and make every plain property read-only and
    /// non-configurable
    ///
    /// Reactive properties keep their accessors (as frozen accessor
    /// properties do) but can no longer be deleted or redefined.
    pub fn freeze(&self) {
        self.prevent_extensions();
        for slot in self.inner.slots.borrow_mut().values_mut() {
            match slot {
                Slot::Plain(desc) => {
                    desc.configurable = false;
                    if let DescriptorKind::Data { writable, .. } = &mut desc.kind {
                        *writable = false;
                    }
                }
                Slot::Reactive { configurable, .. } => *configurable = false,
            }
        }
    }

    /// Check whether new properties may be added
    pub fn is_extensible(&self) -> bool {
        self.inner.extensible.get()
    }

    /// Mark this object as an internal framework instance
    ///
    /// Internal instances are never observed, and [`set`](crate::set) /
    /// [`del`](crate::del) refuse to add or remove their keys.
    pub fn mark_internal(&self) {
        self.inner.internal.set(true);
    }

    /// Check whether this object is an internal instance
    pub fn is_internal(&self) -> bool {
        self.inner.internal.get()
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id())
            .field("keys", &self.keys())
            .finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let object = Object::new();
        for (key, value) in iter {
            object.assign(key, value);
        }
        object
    }
}
