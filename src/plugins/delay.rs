use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use super::traits::{Outcome, Plugin, PluginError, PluginResult};
use crate::humanize::Interval;
use crate::ledger::partitions::{encode_delay_key, encode_delay_prefix};
use crate::ledger::{DelayRecord, Partition};
use crate::task::{Phase, Task};

/// Hold new entries back for a while before letting them through
///
/// First sight of an entry stores it with a release time and rejects it as
/// `delayed`. Once released, the stored entry is injected again (even if the
/// input no longer produces it) and the record is dropped.
pub struct Delay;

fn parse_delay(config: &Value) -> Result<Interval, String> {
    serde_json::from_value(config.clone()).map_err(|e| e.to_string())
}

#[async_trait]
impl Plugin for Delay {
    async fn on_phase(&self, _phase: Phase, task: &mut Task, config: &Value) -> PluginResult {
        let delay = parse_delay(config).map_err(PluginError::Config)?;
        let now = Utc::now();
        let Some(release_at) = delay.after(now) else {
            return Ok(Outcome::fatal(format!("release time {} from now is out of range", delay)));
        };
        let name = task.name().to_string();

        let mut held = 0;
        for id in task.entry_ids() {
            let Some(entry) = task.entry(id).cloned() else { continue };
            let key = encode_delay_key(&name, entry.uid());

            if task.session().get_raw(Partition::Delay, &key)?.is_none() {
                let record = DelayRecord {
                    task: name.clone(),
                    entry,
                    release_at,
                };
                task.session().put_json(Partition::Delay, &key, &record)?;
                held += 1;
            }
            // released records are injected below, so the live copy always goes
            task.reject(id, Some("delayed"))?;
        }

        let mut released = 0;
        for (key, record) in task
            .session()
            .scan_json::<DelayRecord>(Partition::Delay, &encode_delay_prefix(&name))?
        {
            if !record.is_released(now) {
                continue;
            }
            task.session().remove(Partition::Delay, &key);
            if task.add_entry(record.entry).is_some() {
                released += 1;
            }
        }

        debug!(task = %name, held, released, "Delay applied");
        Ok(Outcome::Done)
    }

    fn validate_config(&self, config: &Value) -> Result<(), String> {
        parse_delay(config).map(|_| ())
    }
}
