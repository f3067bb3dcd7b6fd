use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::traits::{Outcome, Plugin, PluginResult};
use crate::entry::is_truthy;
use crate::task::{Phase, Task};

/// Output plugin logging every remaining entry with its state
pub struct Dump;

#[async_trait]
impl Plugin for Dump {
    async fn on_phase(&self, _phase: Phase, task: &mut Task, config: &Value) -> PluginResult {
        if !is_truthy(Some(config)) {
            return Ok(Outcome::Done);
        }

        let verbose = config.as_str() == Some("verbose");
        for entry in task.entries() {
            let state = entry.state();
            let reason = entry.reason().unwrap_or("");
            if verbose {
                let fields = serde_json::to_string(entry.fields()).unwrap_or_default();
                info!(task = task.name(), %state, reason, fields = %fields, "{}", entry);
            } else {
                info!(task = task.name(), %state, reason, "{}", entry);
            }
        }
        Ok(Outcome::Done)
    }

    fn validate_config(&self, config: &Value) -> Result<(), String> {
        match config {
            Value::Bool(_) => Ok(()),
            Value::String(mode) if mode == "verbose" => Ok(()),
            other => Err(format!("expected true, false or \"verbose\", got {}", other)),
        }
    }
}
