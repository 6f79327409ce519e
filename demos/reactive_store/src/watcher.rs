//! A minimal render watcher and batching queue on top of ripple-core

use ripple_core::{Dep, DepId, EvalScope, Subscriber, SubscriberRef};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

/// Watchers waiting to re-render, in the order they were first notified
#[derive(Default, Clone)]
pub struct Queue {
    pending: Rc<RefCell<Vec<Rc<Watcher>>>>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, watcher: Rc<Watcher>) {
        self.pending.borrow_mut().push(watcher);
    }

    /// Re-render every pending watcher, including ones queued while flushing
    ///
    /// Returns the number of renders.
    pub fn flush(&self) -> usize {
        let mut renders = 0;
        loop {
            let batch = std::mem::take(&mut *self.pending.borrow_mut());
            if batch.is_empty() {
                return renders;
            }
            for watcher in batch {
                watcher.run();
                renders += 1;
            }
        }
    }
}

/// Re-runs a render closure whenever something it read changes
pub struct Watcher {
    me: Weak<Watcher>,
    name: String,
    render: Box<dyn Fn() -> String>,
    output: RefCell<String>,
    queued: Cell<bool>,
    deps: RefCell<Vec<Dep>>,
    new_deps: RefCell<Vec<Dep>>,
    new_ids: RefCell<HashSet<DepId>>,
    queue: Queue,
}

impl Watcher {
    /// Create a watcher and render it once
    pub fn new(name: &str, queue: &Queue, render: impl Fn() -> String + 'static) -> Rc<Self> {
        let watcher = Rc::new_cyclic(|me| Watcher {
            me: me.clone(),
            name: name.to_string(),
            render: Box::new(render),
            output: RefCell::new(String::new()),
            queued: Cell::new(false),
            deps: RefCell::new(Vec::new()),
            new_deps: RefCell::new(Vec::new()),
            new_ids: RefCell::new(HashSet::new()),
            queue: queue.clone(),
        });
        watcher.run();
        watcher
    }

    pub fn output(&self) -> String {
        self.output.borrow().clone()
    }

    pub fn dep_count(&self) -> usize {
        self.deps.borrow().len()
    }

    fn run(&self) {
        let Some(me) = self.me.upgrade() else {
            return;
        };
        let sub: SubscriberRef = me;
        self.queued.set(false);
        self.new_ids.borrow_mut().clear();

        let output = {
            let _scope = EvalScope::enter(sub.clone());
            (self.render)()
        };
        tracing::info!(watcher = %self.name, %output, "rendered");
        *self.output.borrow_mut() = output;

        let fresh = std::mem::take(&mut *self.new_deps.borrow_mut());
        let kept = self.new_ids.borrow();
        for dep in self.deps.borrow().iter() {
            if !kept.contains(&dep.id()) {
                tracing::debug!(watcher = %self.name, dep = %dep.id(), "dropping dependency");
                dep.remove_subscriber(&sub);
            }
        }
        *self.deps.borrow_mut() = fresh;
    }
}

impl Subscriber for Watcher {
    fn update(&self) {
        if self.queued.replace(true) {
            return;
        }
        if let Some(me) = self.me.upgrade() {
            tracing::debug!(watcher = %self.name, "queued");
            self.queue.push(me);
        }
    }

    fn on_track(&self, dep: &Dep) -> bool {
        if !self.new_ids.borrow_mut().insert(dep.id()) {
            return false;
        }
        self.new_deps.borrow_mut().push(dep.clone());
        true
    }
}
