use async_trait::async_trait;
use serde_json::Value;

use super::traits::{Outcome, Plugin, PluginResult};
use crate::entry::is_truthy;
use crate::task::{Phase, Task};

/// Filter accepting every undecided entry
pub struct AcceptAll;

#[async_trait]
impl Plugin for AcceptAll {
    async fn on_phase(&self, _phase: Phase, task: &mut Task, config: &Value) -> PluginResult {
        if !is_truthy(Some(config)) {
            return Ok(Outcome::Done);
        }
        for id in task.undecided_ids() {
            task.accept(id, None)?;
        }
        Ok(Outcome::Done)
    }

    fn validate_config(&self, config: &Value) -> Result<(), String> {
        match config {
            Value::Bool(_) => Ok(()),
            other => Err(format!("expected true or false, got {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::testing::{call, open_store, task_with_entries, titles};
    use serde_json::json;

    #[tokio::test]
    async fn test_accepts_undecided_entries_in_order() {
        let (store, _dir) = open_store();
        let mut task = task_with_entries(&store, &["Foo", "Bar", "Baz"]);
        let baz = task.entry_ids()[2];
        task.reject(baz, Some("nope")).unwrap();

        call(&AcceptAll, "accept_all", Phase::Filter, &mut task, &json!(true))
            .await
            .unwrap();

        assert_eq!(titles(task.accepted()), vec!["Foo", "Bar"]);
        assert_eq!(titles(task.rejected()), vec!["Baz"]);
        let decision = task.accepted().next().unwrap().decision().unwrap();
        assert_eq!(decision.plugin.as_deref(), Some("accept_all"));
    }

    #[test]
    fn test_validate_config() {
        assert!(AcceptAll.validate_config(&json!(true)).is_ok());
        assert!(AcceptAll.validate_config(&json!("yes")).is_err());
    }
}
