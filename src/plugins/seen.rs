//! Duplicate suppression across runs
//!
//! The filter handler rejects entries whose `title`, `url` or `original_url`
//! (configurable) was learned before; the learn handler remembers the same
//! fields of every accepted entry. Records are global unless the task asks
//! for `local`, in which case only the task itself sees them.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

use super::traits::{Outcome, Plugin, PluginError, PluginResult};
use crate::entry::{EntryId, FIELD_ORIGINAL_URL, FIELD_TITLE, FIELD_URL};
use crate::ledger::partitions::{decode_seen_key, encode_seen_key};
use crate::ledger::{FjallStore, Partition, Result as LedgerResult, Scope, SeenRecord};
use crate::task::{Phase, Task};

const DEFAULT_FIELDS: [&str; 3] = [FIELD_TITLE, FIELD_URL, FIELD_ORIGINAL_URL];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeenConfig {
    #[serde(default = "default_fields")]
    fields: Vec<String>,
    #[serde(default)]
    local: bool,
}

fn default_fields() -> Vec<String> {
    DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect()
}

impl SeenConfig {
    fn parse(config: &Value) -> Result<Option<Self>, String> {
        match config {
            Value::Bool(false) => Ok(None),
            Value::Bool(true) | Value::Null => Ok(Some(Self {
                fields: default_fields(),
                local: false,
            })),
            Value::String(mode) if mode == "local" => Ok(Some(Self {
                fields: default_fields(),
                local: true,
            })),
            Value::Object(_) => {
                let parsed: Self = serde_json::from_value(config.clone()).map_err(|e| e.to_string())?;
                if parsed.fields.is_empty() {
                    return Err("fields must not be empty".to_string());
                }
                Ok(Some(parsed))
            }
            other => Err(format!(
                "expected true, false, \"local\" or {{fields, local}}, got {}",
                other
            )),
        }
    }
}

/// Builtin filter rejecting previously seen entries
pub struct Seen;

impl Seen {
    fn filter(task: &mut Task, config: &SeenConfig) -> PluginResult {
        let task_scope = Scope::Task(task.name().to_string());

        let checks: Vec<(EntryId, Vec<(&str, String)>)> = task
            .entries_with_ids()
            .map(|(id, entry)| {
                let values = config
                    .fields
                    .iter()
                    .filter_map(|field| {
                        entry
                            .get_str(field)
                            .filter(|v| !v.is_empty())
                            .map(|v| (field.as_str(), v.to_string()))
                    })
                    .collect();
                (id, values)
            })
            .collect();

        for (id, values) in checks {
            let mut hit = None;
            for (field, value) in values {
                let mut found = task
                    .session()
                    .get_raw(Partition::Seen, &encode_seen_key(&task_scope, &value))?
                    .is_some();
                if !found && !config.local {
                    found = task
                        .session()
                        .get_raw(Partition::Seen, &encode_seen_key(&Scope::Global, &value))?
                        .is_some();
                }
                if found {
                    hit = Some(format!("Entry with {} `{}` is already seen", field, value));
                    break;
                }
            }

            if let Some(reason) = hit {
                task.reject(id, Some(&reason))?;
            }
        }
        Ok(Outcome::Done)
    }

    fn learn(task: &mut Task, config: &SeenConfig) -> PluginResult {
        let scope = if config.local {
            Scope::Task(task.name().to_string())
        } else {
            Scope::Global
        };
        let now = Utc::now();

        let mut records = Vec::new();
        for entry in task.accepted() {
            let mut values = HashSet::new();
            for field in &config.fields {
                let Some(value) = entry.get_str(field).filter(|v| !v.is_empty()) else {
                    continue;
                };
                if !values.insert(value) {
                    continue;
                }
                records.push(SeenRecord {
                    task: task.name().to_string(),
                    title: entry.title().to_string(),
                    field: field.clone(),
                    value: value.to_string(),
                    local: config.local,
                    added: now,
                });
            }
        }

        let learned = records.len();
        for record in records {
            let key = encode_seen_key(&scope, &record.value);
            task.session().put_json(Partition::Seen, &key, &record)?;
        }
        if learned > 0 {
            debug!(task = task.name(), learned, %scope, "Learned seen values");
        }
        Ok(Outcome::Done)
    }
}

#[async_trait]
impl Plugin for Seen {
    async fn on_phase(&self, phase: Phase, task: &mut Task, config: &Value) -> PluginResult {
        let Some(config) = SeenConfig::parse(config).map_err(PluginError::Config)? else {
            return Ok(Outcome::Done);
        };

        match phase {
            Phase::Filter => Self::filter(task, &config),
            Phase::Learn => Self::learn(task, &config),
            _ => Ok(Outcome::Done),
        }
    }

    fn validate_config(&self, config: &Value) -> Result<(), String> {
        SeenConfig::parse(config).map(|_| ())
    }
}

/// Forget every seen record whose value or entry title equals `value`
pub fn forget(store: &FjallStore, value: &str) -> LedgerResult<usize> {
    let mut removed = 0;
    for (key, raw) in store.scan_prefix(Partition::Seen, b"seen:")? {
        let by_key = decode_seen_key(&key).is_some_and(|(_, v)| v == value);
        let by_title = serde_json::from_slice::<SeenRecord>(&raw).is_ok_and(|r| r.title == value);
        if by_key || by_title {
            store.remove(Partition::Seen, &key)?;
            removed += 1;
        }
    }

    if removed > 0 {
        store.persist()?;
    }
    info!(value, removed, "Forgot seen records");
    Ok(removed)
}
