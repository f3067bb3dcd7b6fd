use async_trait::async_trait;
use serde_json::Value;

use super::traits::{Outcome, Plugin, PluginError, PluginResult};
use crate::task::{Phase, Task};

/// Metainfo plugin writing fixed field values onto every entry
pub struct SetFields;

#[async_trait]
impl Plugin for SetFields {
    async fn on_phase(&self, _phase: Phase, task: &mut Task, config: &Value) -> PluginResult {
        let fields = config
            .as_object()
            .ok_or_else(|| PluginError::Config("set expects a map of field values".to_string()))?;

        for id in task.entry_ids() {
            if let Some(entry) = task.entry_mut(id) {
                for (key, value) in fields {
                    entry.set(key.clone(), value.clone());
                }
            }
        }
        Ok(Outcome::Done)
    }

    fn validate_config(&self, config: &Value) -> Result<(), String> {
        let fields = config.as_object().ok_or("expected a map of field values")?;
        if fields.contains_key(crate::entry::FIELD_ORIGINAL_URL) {
            return Err("original_url cannot be set".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::testing::{call, open_store, task_with_entries};
    use serde_json::json;

    #[tokio::test]
    async fn test_sets_fields_on_every_entry() {
        let (store, _dir) = open_store();
        let mut task = task_with_entries(&store, &["Foo", "Bar"]);

        call(
            &SetFields,
            "set",
            Phase::Metainfo,
            &mut task,
            &json!({"quality": "720p", "url": "http://mirror/x"}),
        )
        .await
        .unwrap();

        for entry in task.entries() {
            assert_eq!(entry.get_str("quality"), Some("720p"));
            assert_eq!(entry.url(), "http://mirror/x");
            assert_ne!(entry.original_url(), Some("http://mirror/x"));
        }
    }

    #[test]
    fn test_validate_config() {
        assert!(SetFields.validate_config(&json!({"a": 1})).is_ok());
        assert!(SetFields.validate_config(&json!(["a"])).is_err());
        assert!(SetFields.validate_config(&json!({"original_url": "x"})).is_err());
    }
}
