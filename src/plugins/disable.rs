use async_trait::async_trait;
use serde_json::Value;

use super::registry::ALL_BUILTINS;
use super::traits::{Outcome, Plugin, PluginResult};
use crate::task::{Phase, Task};

/// Config-only plugin: `disable = "builtins"` or a list of builtin names
///
/// The registry reads the value when selecting candidates; this plugin
/// handles no phase and only validates its config.
pub struct Disable;

#[async_trait]
impl Plugin for Disable {
    async fn on_phase(&self, _phase: Phase, _task: &mut Task, _config: &Value) -> PluginResult {
        Ok(Outcome::Done)
    }

    fn validate_config(&self, config: &Value) -> Result<(), String> {
        match config {
            Value::String(_) => Ok(()),
            Value::Array(items) if items.iter().all(Value::is_string) => Ok(()),
            other => Err(format!(
                "expected \"{}\" or a list of plugin names, got {}",
                ALL_BUILTINS, other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_config() {
        assert!(Disable.validate_config(&json!("builtins")).is_ok());
        assert!(Disable.validate_config(&json!(["seen"])).is_ok());
        assert!(Disable.validate_config(&json!([1])).is_err());
        assert!(Disable.validate_config(&json!({"seen": true})).is_err());
    }
}
