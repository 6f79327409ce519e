//! Dependency sets and the active-subscriber slot
//!
//! A [`Dep`] is the registry of subscribers interested in one piece of state.
//! Reads call [`Dep::depend`], which registers whichever subscriber is
//! currently evaluating; writes call [`Dep::notify`].
//!
//! The "currently evaluating" subscriber lives in a thread-local slot. The
//! scheduler that drives evaluations owns the slot: it must save the previous
//! occupant on entry and restore it on exit, because evaluations nest (a
//! subscriber notified during another evaluation may evaluate itself
//! immediately). [`push_target`] / [`pop_target`] keep an explicit stack of
//! saved occupants, and [`EvalScope`] pairs them up automatically.
//!
//! # Example
//!
//! ```
//! use ripple_core::{Dep, EvalScope, FnSubscriber};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let hits = Rc::new(Cell::new(0));
//! let sub = FnSubscriber::shared({
//!     let hits = hits.clone();
//!     move || hits.set(hits.get() + 1)
//! });
//!
//! let dep = Dep::new();
//! {
//!     let _scope = EvalScope::enter(sub.clone());
//!     dep.depend();
//! }
//! dep.notify();
//! assert_eq!(hits.get(), 1);
//! ```

use crate::config::diagnostics_enabled;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

/// A consumer of change notifications
///
/// Implemented by whatever drives evaluation (a view, a derived value, a test
/// probe). The engine never owns subscribers: dependency sets hold weak
/// references, so a subscriber that is dropped simply stops being notified.
pub trait Subscriber {
    /// Called synchronously when a dependency this subscriber registered on changes
    fn update(&self);

    /// Called when `dep` is about to register this subscriber
    ///
    /// Returning `false` skips the registration. Schedulers use this to track
    /// which dependency sets an evaluation touched, or to de-duplicate per pass.
    fn on_track(&self, dep: &Dep) -> bool {
        let _ = dep;
        true
    }
}

/// Shared handle to a subscriber
pub type SubscriberRef = Rc<dyn Subscriber>;

/// A subscriber backed by a closure
pub struct FnSubscriber<F: Fn()> {
    f: F,
}

impl<F: Fn()> FnSubscriber<F> {
    /// Wrap a closure as a subscriber
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F: Fn() + 'static> FnSubscriber<F> {
    /// Wrap a closure as a shared subscriber handle
    pub fn shared(f: F) -> SubscriberRef {
        Rc::new(Self::new(f))
    }
}

impl<F: Fn()> Subscriber for FnSubscriber<F> {
    fn update(&self) {
        (self.f)()
    }
}

impl<F: Fn()> fmt::Debug for FnSubscriber<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSubscriber").finish_non_exhaustive()
    }
}

/// Unique identifier of a dependency set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepId(u64);

impl DepId {
    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dep:{}", self.0)
    }
}

thread_local! {
    static NEXT_DEP_ID: Cell<u64> = const { Cell::new(0) };
    static TARGET: RefCell<Option<SubscriberRef>> = const { RefCell::new(None) };
    static TARGET_STACK: RefCell<Vec<Option<SubscriberRef>>> = const { RefCell::new(Vec::new()) };
}

/// A registry of subscribers for one piece of state
///
/// Cloning a `Dep` yields another handle to the same registry.
#[derive(Clone)]
pub struct Dep {
    inner: Rc<DepInner>,
}

struct DepInner {
    id: DepId,
    /// Registration order is notification order
    subs: RefCell<Vec<Weak<dyn Subscriber>>>,
}

impl Dep {
    /// Create an empty dependency set
    pub fn new() -> Self {
        let id = NEXT_DEP_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            DepId(id)
        });
        Self {
            inner: Rc::new(DepInner {
                id,
                subs: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Get this set's identifier
    pub fn id(&self) -> DepId {
        self.inner.id
    }

    /// Register a subscriber
    ///
    /// A subscriber that is already registered is not added again.
    pub fn add_subscriber(&self, sub: &SubscriberRef) {
        let mut subs = self.inner.subs.borrow_mut();
        if subs.iter().any(|w| same_subscriber(w, sub)) {
            return;
        }
        subs.push(Rc::downgrade(sub));
    }

    /// Unregister a subscriber
    pub fn remove_subscriber(&self, sub: &SubscriberRef) {
        self.inner
            .subs
            .borrow_mut()
            .retain(|w| !same_subscriber(w, sub));
    }

    /// Check whether a subscriber is registered
    pub fn has_subscriber(&self, sub: &SubscriberRef) -> bool {
        self.inner
            .subs
            .borrow()
            .iter()
            .any(|w| same_subscriber(w, sub))
    }

    /// Number of live registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subs
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Register the active subscriber, if there is one
    pub fn depend(&self) {
        let Some(target) = current_target() else {
            return;
        };
        if target.on_track(self) {
            self.add_subscriber(&target);
        }
    }

    /// Notify every registered subscriber, in registration order
    ///
    /// Iterates over a snapshot, so subscribers may register or unregister
    /// (themselves or others) from inside `update` without affecting the
    /// current pass.
    pub fn notify(&self) {
        let snapshot: Vec<SubscriberRef> = {
            let mut subs = self.inner.subs.borrow_mut();
            subs.retain(|w| w.strong_count() > 0);
            subs.iter().filter_map(Weak::upgrade).collect()
        };
        for sub in snapshot {
            sub.update();
        }
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.inner.id)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

fn same_subscriber(registered: &Weak<dyn Subscriber>, sub: &SubscriberRef) -> bool {
    registered.as_ptr() as *const () == Rc::as_ptr(sub) as *const ()
}

/// Get the subscriber currently evaluating, if any
pub fn current_target() -> Option<SubscriberRef> {
    TARGET.with(|t| t.borrow().clone())
}

/// Check whether a subscriber is currently evaluating
pub fn has_target() -> bool {
    TARGET.with(|t| t.borrow().is_some())
}

/// Make `target` the active subscriber, saving the current one
///
/// Every call must be balanced by a [`pop_target`]. Pushing `None` suspends
/// tracking for a nested section.
pub fn push_target(target: Option<SubscriberRef>) {
    let previous = TARGET.with(|t| t.replace(target));
    TARGET_STACK.with(|stack| stack.borrow_mut().push(previous));
}

/// Restore the subscriber that was active before the matching [`push_target`]
pub fn pop_target() {
    let saved = TARGET_STACK.with(|stack| stack.borrow_mut().pop());
    let restored = match saved {
        Some(previous) => previous,
        None => {
            if diagnostics_enabled() {
                tracing::warn!("pop_target called without a matching push_target");
            }
            None
        }
    };
    // Drop the outgoing subscriber only after the slot is released
    let _outgoing = TARGET.with(|t| t.replace(restored));
}

/// Depth of the saved-target stack
pub fn target_depth() -> usize {
    TARGET_STACK.with(|stack| stack.borrow().len())
}

/// Guard that keeps a subscriber active for its lifetime
///
/// Dropping the guard restores whichever subscriber was active before it.
#[derive(Debug)]
#[must_use = "the previous subscriber is restored as soon as the scope is dropped"]
pub struct EvalScope {
    _not_send: PhantomData<*const ()>,
}

impl EvalScope {
    /// Start evaluating as `sub`
    pub fn enter(sub: SubscriberRef) -> Self {
        push_target(Some(sub));
        Self {
            _not_send: PhantomData,
        }
    }

    /// Suspend tracking until the scope is dropped
    pub fn untracked() -> Self {
        push_target(None);
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for EvalScope {
    fn drop(&mut self) {
        pop_target();
    }
}

/// Run `f` as `sub`, registering it on every dependency `f` reads
pub fn evaluate<T>(sub: &SubscriberRef, f: impl FnOnce() -> T) -> T {
    let _scope = EvalScope::enter(sub.clone());
    f()
}

/// Run `f` without an active subscriber
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _scope = EvalScope::untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (SubscriberRef, Rc<Cell<usize>>) {
        let hits = Rc::new(Cell::new(0));
        let sub = FnSubscriber::shared({
            let hits = hits.clone();
            move || hits.set(hits.get() + 1)
        });
        (sub, hits)
    }

    #[test]
    fn test_depend_without_target_is_noop() {
        let dep = Dep::new();
        dep.depend();
        assert_eq!(dep.subscriber_count(), 0);
    }

    #[test]
    fn test_depend_registers_once() {
        let dep = Dep::new();
        let (sub, hits) = counter();

        evaluate(&sub, || {
            dep.depend();
            dep.depend();
        });
        assert_eq!(dep.subscriber_count(), 1);

        dep.notify();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_notify_in_registration_order() {
        let dep = Dep::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let subs: Vec<SubscriberRef> = (0..3)
            .map(|i| {
                let order = order.clone();
                FnSubscriber::shared(move || order.borrow_mut().push(i))
            })
            .collect();

        for sub in &subs {
            dep.add_subscriber(sub);
        }
        dep.notify();

        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_remove_subscriber() {
        let dep = Dep::new();
        let (sub, hits) = counter();

        dep.add_subscriber(&sub);
        assert!(dep.has_subscriber(&sub));
        dep.remove_subscriber(&sub);
        assert!(!dep.has_subscriber(&sub));

        dep.notify();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let dep = Dep::new();
        let (sub, _) = counter();
        dep.add_subscriber(&sub);
        drop(sub);

        assert_eq!(dep.subscriber_count(), 0);
        dep.notify();
    }

    struct SelfRemoving {
        dep: Dep,
        me: RefCell<Option<Weak<SelfRemoving>>>,
        hits: Cell<usize>,
    }

    impl Subscriber for SelfRemoving {
        fn update(&self) {
            self.hits.set(self.hits.get() + 1);
            if let Some(me) = self.me.borrow().as_ref().and_then(Weak::upgrade) {
                let me: SubscriberRef = me;
                self.dep.remove_subscriber(&me);
            }
        }
    }

    #[test]
    fn test_notify_uses_snapshot() {
        let dep = Dep::new();
        let remover = Rc::new(SelfRemoving {
            dep: dep.clone(),
            me: RefCell::new(None),
            hits: Cell::new(0),
        });
        *remover.me.borrow_mut() = Some(Rc::downgrade(&remover));
        let remover_ref: SubscriberRef = remover.clone();

        let (late, late_hits) = counter();
        let adder = FnSubscriber::shared({
            let dep = dep.clone();
            let late = late.clone();
            move || dep.add_subscriber(&late)
        });
        let (after, after_hits) = counter();

        dep.add_subscriber(&remover_ref);
        dep.add_subscriber(&adder);
        dep.add_subscriber(&after);

        dep.notify();

        // The remover left, the late subscriber joined, but neither changed this pass
        assert_eq!(remover.hits.get(), 1);
        assert_eq!(after_hits.get(), 1);
        assert_eq!(late_hits.get(), 0);
        assert!(!dep.has_subscriber(&remover_ref));

        dep.notify();
        assert_eq!(remover.hits.get(), 1);
        assert_eq!(late_hits.get(), 1);
        assert_eq!(after_hits.get(), 2);
    }

    #[test]
    fn test_nested_scopes_restore_previous_target() {
        let (outer, _) = counter();
        let (inner, _) = counter();

        assert!(!has_target());
        {
            let _outer = EvalScope::enter(outer.clone());
            {
                let _inner = EvalScope::enter(inner.clone());
                let active = current_target().unwrap();
                assert!(Rc::ptr_eq(&active, &inner));
                assert_eq!(target_depth(), 2);
            }
            let active = current_target().unwrap();
            assert!(Rc::ptr_eq(&active, &outer));

            untracked(|| assert!(!has_target()));
            assert!(has_target());
        }
        assert!(!has_target());
        assert_eq!(target_depth(), 0);
    }

    #[test]
    fn test_unbalanced_pop_clears_target() {
        pop_target();
        assert!(!has_target());
        assert_eq!(target_depth(), 0);
    }

    struct Vetoing;

    impl Subscriber for Vetoing {
        fn update(&self) {}

        fn on_track(&self, _dep: &Dep) -> bool {
            false
        }
    }

    #[test]
    fn test_on_track_can_veto_registration() {
        let dep = Dep::new();
        let sub: SubscriberRef = Rc::new(Vetoing);
        evaluate(&sub, || dep.depend());
        assert_eq!(dep.subscriber_count(), 0);
    }

    #[test]
    fn test_dep_ids_are_unique() {
        let a = Dep::new();
        let b = Dep::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }
}
