use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::traits::{Outcome, Plugin, PluginError, PluginResult};
use crate::entry::Entry;
use crate::task::{Phase, Task};

/// Input plugin producing entries straight from the task config
///
/// ```toml
/// mock = [{ title = "Foo", url = "http://x/1" }, { title = "Bar", url = "http://x/2" }]
/// ```
pub struct MockInput;

#[async_trait]
impl Plugin for MockInput {
    async fn on_phase(&self, _phase: Phase, task: &mut Task, config: &Value) -> PluginResult {
        let items = config
            .as_array()
            .ok_or_else(|| PluginError::Config("mock expects a list of entries".to_string()))?;

        let mut added = 0;
        for item in items {
            let Value::Object(fields) = item else {
                return Err(PluginError::Config(format!("mock entry is not a map: {}", item)));
            };
            if task.add_entry(Entry::from_fields(fields.clone())).is_some() {
                added += 1;
            }
        }

        debug!(task = task.name(), added, "Mock input produced entries");
        Ok(Outcome::Done)
    }

    fn validate_config(&self, config: &Value) -> Result<(), String> {
        let items = config.as_array().ok_or("expected a list of entries")?;
        if let Some(bad) = items.iter().find(|item| !item.is_object()) {
            return Err(format!("entries must be maps, got {}", bad));
        }
        Ok(())
    }
}
