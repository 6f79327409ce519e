//! Ripple Core - Dependency tracking and change notification for dynamic data
//!
//! This crate turns plain, dynamically-shaped data into data whose reads are
//! recorded and whose writes notify whoever read it:
//! - Shared containers (`Object`, `Array`) holding dynamic `Value`s
//! - Dependency sets (`Dep`) and the active-subscriber stack
//! - Per-container observers created by `observe`
//! - Reactive properties installed by `define_reactive`
//! - Instrumented array mutators
//! - Explicit `set` / `del` for keys that did not exist up front
//!
//! ## Tracking model
//!
//! A subscriber is anything implementing [`Subscriber`]. While it is the
//! active target (see [`EvalScope`] and [`evaluate`]), every reactive read
//! registers it with the relevant [`Dep`]s. A write that actually changes a
//! value calls [`Dep::notify`], which calls [`Subscriber::update`] on every
//! registered subscriber, in registration order. Scheduling what happens
//! on update is left to the subscriber.
//!
//! ```
//! use ripple_core::{evaluate, observe, FnSubscriber, Object, Value};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let data = Object::new();
//! data.assign("count", 1i64);
//! observe(&Value::Object(data.clone()), true);
//!
//! let renders = Rc::new(Cell::new(0));
//! let view = FnSubscriber::shared({
//!     let renders = renders.clone();
//!     move || renders.set(renders.get() + 1)
//! });
//!
//! evaluate(&view, || data.get("count"));
//! data.assign("count", 2i64);
//! data.assign("count", 2i64);
//! assert_eq!(renders.get(), 1);
//! ```
//!
//! ## Threading
//!
//! All bookkeeping (active target stack, observer table, configuration)
//! is thread-local, and containers are `!Send`. Each thread is an
//! independent reactive world.

mod array;
mod config;
mod dep;
mod error;
mod mutation;
mod object;
mod observer;
mod reactive;
mod tagger;
mod value;

pub use array::Array;
pub use config::{
    config, set_config, set_should_convert, should_convert, with_config, without_conversion,
    ReactiveConfig,
};
pub use dep::{
    current_target, evaluate, has_target, pop_target, push_target, target_depth, untracked, Dep,
    DepId, EvalScope, FnSubscriber, Subscriber, SubscriberRef,
};
pub use error::{Error, Result};
pub use mutation::{del, set};
pub use object::{Getter, Object, PropertyDescriptor, Setter};
pub use observer::{observe, observer_of, Observer};
pub use reactive::{define_reactive, depend_array, has_changed, CustomSetter};
pub use tagger::tagged_count;
pub use value::{ContainerId, Key, Value};
