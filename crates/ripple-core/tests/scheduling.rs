//! Driving the engine from a small batching scheduler

use ripple_core::{
    current_target, del, observe, set, target_depth, Dep, DepId, EvalScope, Object, Subscriber,
    SubscriberRef, Value,
};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

type Queue = Rc<RefCell<Vec<Rc<Watcher>>>>;

/// Re-runs `render` when anything it read changes, batched through `queue`
struct Watcher {
    me: Weak<Watcher>,
    render: Box<dyn Fn() -> String>,
    output: RefCell<String>,
    runs: Cell<usize>,
    dirty: Cell<bool>,
    deps: RefCell<Vec<Dep>>,
    new_deps: RefCell<Vec<Dep>>,
    new_ids: RefCell<HashSet<DepId>>,
    queue: Queue,
}

impl Watcher {
    fn new(queue: &Queue, render: impl Fn() -> String + 'static) -> Rc<Self> {
        let watcher = Rc::new_cyclic(|me| Watcher {
            me: me.clone(),
            render: Box::new(render),
            output: RefCell::new(String::new()),
            runs: Cell::new(0),
            dirty: Cell::new(false),
            deps: RefCell::new(Vec::new()),
            new_deps: RefCell::new(Vec::new()),
            new_ids: RefCell::new(HashSet::new()),
            queue: queue.clone(),
        });
        watcher.run();
        watcher
    }

    fn handle(&self) -> Option<SubscriberRef> {
        self.me.upgrade().map(|w| w as SubscriberRef)
    }

    fn run(&self) {
        let Some(sub) = self.handle() else {
            return;
        };
        self.dirty.set(false);
        self.new_ids.borrow_mut().clear();
        let output = {
            let _scope = EvalScope::enter(sub.clone());
            (self.render)()
        };
        *self.output.borrow_mut() = output;
        self.runs.set(self.runs.get() + 1);

        // Unsubscribe from whatever this run no longer read
        let fresh = std::mem::take(&mut *self.new_deps.borrow_mut());
        let ids = self.new_ids.borrow().clone();
        for dep in self.deps.borrow().iter() {
            if !ids.contains(&dep.id()) {
                dep.remove_subscriber(&sub);
            }
        }
        *self.deps.borrow_mut() = fresh;
    }

    fn dep_count(&self) -> usize {
        self.deps.borrow().len()
    }
}

impl Subscriber for Watcher {
    fn update(&self) {
        if self.dirty.replace(true) {
            return;
        }
        if let Some(me) = self.me.upgrade() {
            self.queue.borrow_mut().push(me);
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

fn flush(queue: &Queue) -> usize {
    let mut flushed = 0;
    loop {
        let batch = std::mem::take(&mut *queue.borrow_mut());
        if batch.is_empty() {
            return flushed;
        }
        for watcher in batch {
            watcher.run();
            flushed += 1;
        }
    }
}

fn text(object: &Object, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[test]
fn batches_writes_into_one_render() {
    let queue = Queue::default();
    let state: Object = [("first", "Ada"), ("last", "Lovelace")].into_iter().collect();
    observe(&Value::Object(state.clone()), true);

    let view = Watcher::new(&queue, {
        let state = state.clone();
        move || format!("{} {}", text(&state, "first"), text(&state, "last"))
    });
    assert_eq!(*view.output.borrow(), "Ada Lovelace");
    assert_eq!(view.dep_count(), 2);

    state.assign("first", "Grace");
    state.assign("last", "Hopper");
    assert_eq!(flush(&queue), 1);
    assert_eq!(*view.output.borrow(), "Grace Hopper");
    assert_eq!(view.runs.get(), 2);
}

#[test]
fn dropped_branch_is_unsubscribed() {
    let queue = Queue::default();
    let state: Object = [
        ("show", Value::Bool(true)),
        ("detail", Value::from("x")),
    ]
    .into_iter()
    .collect();
    observe(&Value::Object(state.clone()), true);

    let view = Watcher::new(&queue, {
        let state = state.clone();
        move || match state.get("show").and_then(|v| v.as_bool()) {
            Some(true) => text(&state, "detail"),
            _ => String::from("hidden"),
        }
    });
    assert_eq!(view.dep_count(), 2);

    state.assign("show", false);
    flush(&queue);
    assert_eq!(*view.output.borrow(), "hidden");
    assert_eq!(view.dep_count(), 1);

    state.assign("detail", "y");
    assert_eq!(flush(&queue), 0);
    assert_eq!(view.runs.get(), 2);
}

#[test]
fn added_and_deleted_keys_reach_container_readers() {
    let queue = Queue::default();
    let root = Object::new();
    let tags = Object::new();
    root.assign("tags", tags.clone());
    observe(&Value::Object(root.clone()), true);

    let view = Watcher::new(&queue, {
        let root = root.clone();
        move || {
            let tags = root.get("tags").and_then(|v| v.as_object().cloned());
            tags.map(|t| t.keys().join(",")).unwrap_or_default()
        }
    });
    assert_eq!(*view.output.borrow(), "");

    let tags = Value::Object(tags);
    set(&tags, "rust", true).unwrap();
    flush(&queue);
    assert_eq!(*view.output.borrow(), "rust");

    set(&tags, "wasm", true).unwrap();
    del(&tags, "rust").unwrap();
    assert_eq!(flush(&queue), 1);
    assert_eq!(*view.output.borrow(), "wasm");
}

#[test]
fn nested_evaluation_restores_outer_subscriber() {
    let queue = Queue::default();
    let state: Object = [("a", 1i64), ("b", 2i64)].into_iter().collect();
    observe(&Value::Object(state.clone()), true);

    // A derived value evaluated lazily from inside another evaluation
    let derived: Rc<RefCell<Option<Rc<Watcher>>>> = Rc::default();
    let outer = Watcher::new(&queue, {
        let state = state.clone();
        let derived = derived.clone();
        let queue = queue.clone();
        move || {
            let a = text(&state, "a");
            let inner = derived
                .borrow_mut()
                .get_or_insert_with(|| {
                    let state = state.clone();
                    Watcher::new(&queue, move || text(&state, "b"))
                })
                .clone();
            inner.run();
            let after = text(&state, "b");
            format!("{a}:{}:{after}", inner.output.borrow())
        }
    });

    assert_eq!(*outer.output.borrow(), "1:2:2");
    assert!(current_target().is_none());
    assert_eq!(target_depth(), 0);

    // The outer read of `b` after the nested run registered the outer watcher
    let inner = derived.borrow().clone().unwrap();
    assert_eq!(outer.dep_count(), 2);
    assert_eq!(inner.dep_count(), 1);

    state.assign("b", 3i64);
    assert_eq!(flush(&queue), 2);
    assert_eq!(*outer.output.borrow(), "1:3:3");
}

#[test]
fn writes_during_notification_cascade() {
    let queue = Queue::default();
    let state: Object = [("celsius", 0i64), ("fahrenheit", 32i64)].into_iter().collect();
    observe(&Value::Object(state.clone()), true);

    // Converter watching celsius, writing fahrenheit on every run
    let converter = Watcher::new(&queue, {
        let state = state.clone();
        move || {
            let c = state.get("celsius").and_then(|v| v.as_int()).unwrap_or(0);
            state.assign("fahrenheit", c * 9 / 5 + 32);
            String::new()
        }
    });
    let display = Watcher::new(&queue, {
        let state = state.clone();
        move || text(&state, "fahrenheit")
    });
    assert_eq!(*display.output.borrow(), "32");

    state.assign("celsius", 100i64);
    assert_eq!(flush(&queue), 2);
    assert_eq!(*display.output.borrow(), "212");
    assert_eq!(converter.runs.get(), 2);
}

#[test]
fn dropped_watcher_is_not_notified() {
    let queue = Queue::default();
    let state: Object = [("a", 1i64)].into_iter().collect();
    observe(&Value::Object(state.clone()), true);

    let view = Watcher::new(&queue, {
        let state = state.clone();
        move || text(&state, "a")
    });
    drop(view);

    state.assign("a", 2i64);
    assert!(queue.borrow().is_empty());
}
