//! Reactive Store Example
//!
//! Loads a small todo store from RON, observes it, and drives two views
//! through a batching queue. Every write goes through plain assignment,
//! the array mutators, or `set` / `del`, and only the views that read the
//! changed data re-render.
//!
//! Set `RUST_LOG=debug` to see queueing and dependency cleanup.

mod watcher;

use ripple_core::{del, observe, set, Object, Value};
use tracing_subscriber::EnvFilter;
use watcher::{Queue, Watcher};

const STORE: &str = r#"{
    "title": "Groceries",
    "filter": "all",
    "todos": [
        { "text": "milk", "done": false },
        { "text": "bread", "done": true },
    ],
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    println!("=== Ripple Reactive Store Example ===\n");

    let store: Value = ron::from_str(STORE)?;
    let root = Object::try_from(store.clone())?;
    observe(&store, true);

    let queue = Queue::new();

    let header = Watcher::new("header", &queue, {
        let root = root.clone();
        move || {
            let title = root.get("title").unwrap_or_default();
            let filter = root.get("filter").unwrap_or_default();
            format!("{} ({})", as_text(&title), as_text(&filter))
        }
    });

    let list = Watcher::new("list", &queue, {
        let root = root.clone();
        move || render_list(&root)
    });

    println!("Initial render:");
    println!("  header: {}", header.output());
    println!("  list:   {}\n", list.output());

    println!("Append a todo and rename the list in one batch...");
    let todos = root.get_untracked("todos").unwrap_or_default();
    if let Some(items) = todos.as_array() {
        let todo: Object = [("text", Value::from("eggs")), ("done", Value::Bool(false))]
            .into_iter()
            .collect();
        items.push(todo);
    }
    root.assign("title", "Weekend groceries");
    println!("  renders: {}", queue.flush());
    println!("  header: {}", header.output());
    println!("  list:   {}\n", list.output());

    println!("Complete the first todo through its own reactive key...");
    if let Some(first) = todos.as_array().and_then(|items| items.get(0)) {
        set(&first, "done", true)?;
    }
    println!("  renders: {}", queue.flush());
    println!("  list:   {}\n", list.output());

    println!("Switch to the pending filter...");
    root.assign("filter", "pending");
    println!("  renders: {}", queue.flush());
    println!("  header: {}", header.output());
    println!("  list:   {}\n", list.output());

    println!("Add a note to a todo, then remove it again...");
    if let Some(last) = todos.as_array().and_then(|items| items.get(2)) {
        set(&last, "note", "free range")?;
        println!("  renders: {}", queue.flush());
        println!("  list:   {}", list.output());
        del(&last, "note")?;
        println!("  renders: {}", queue.flush());
        println!("  list:   {}\n", list.output());
    }

    println!("Writing the same value again is not a change...");
    root.assign("filter", "pending");
    println!("  renders: {}\n", queue.flush());

    println!("Final store: {}", ron::to_string(&store)?);
    println!(
        "Dependencies: header={} list={}",
        header.dep_count(),
        list.dep_count()
    );
    Ok(())
}

fn render_list(root: &Object) -> String {
    let pending_only = matches!(root.get("filter"), Some(Value::String(f)) if f == "pending");
    let Some(todos) = root.get("todos") else {
        return String::from("(no todos)");
    };
    let Some(items) = todos.as_array() else {
        return String::from("(no todos)");
    };

    let mut lines = Vec::new();
    for item in items.to_vec() {
        let Some(todo) = item.as_object() else {
            continue;
        };
        let done = todo.get("done").and_then(|v| v.as_bool()).unwrap_or(false);
        if pending_only && done {
            continue;
        }
        let text = todo.get("text").unwrap_or_default();
        let mut line = format!("[{}] {}", if done { "x" } else { " " }, as_text(&text));
        if let Some(note) = todo.get("note") {
            line.push_str(&format!(" ({})", as_text(&note)));
        }
        lines.push(line);
    }
    lines.join(", ")
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
