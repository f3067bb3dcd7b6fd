//! Shared fixtures for plugin unit tests

use serde_json::Value;
use tempfile::TempDir;

use super::traits::{Plugin, PluginResult};
use crate::config::TaskConfig;
use crate::entry::Entry;
use crate::ledger::FjallStore;
use crate::task::{Phase, RunOptions, Task};

pub fn task_config(value: Value) -> TaskConfig {
    value.as_object().cloned().unwrap_or_default()
}

pub fn open_store() -> (FjallStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = FjallStore::open(temp_dir.path().join("ledger")).unwrap();
    (store, temp_dir)
}

pub fn task_on(store: &FjallStore, config: Value, options: RunOptions) -> Task {
    Task::new("tv", task_config(config), store.clone(), options)
}

pub fn task_with_entries(store: &FjallStore, titles: &[&str]) -> Task {
    let mut task = task_on(store, Value::Null, RunOptions::default());
    for (i, title) in titles.iter().enumerate() {
        task.add_entry(Entry::new(*title, format!("http://x/{}", i + 1)));
    }
    task
}

/// Call a handler with the cursor set the way the dispatcher does
pub async fn call(plugin: &dyn Plugin, name: &str, phase: Phase, task: &mut Task, config: &Value) -> PluginResult {
    task.set_cursor(phase, Some(name));
    let result = plugin.on_phase(phase, task, config).await;
    task.clear_plugin_cursor();
    task.purge();
    result
}

pub fn titles<'a>(entries: impl Iterator<Item = &'a Entry>) -> Vec<String> {
    entries.map(|e| e.title().to_string()).collect()
}
