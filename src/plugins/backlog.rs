//! Entry backlog: remember entries for a while and re-inject the ones an
//! input stops producing
//!
//! ```toml
//! backlog = "2 days"
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::traits::{Outcome, Plugin, PluginError, PluginResult};
use crate::entry::Entry;
use crate::humanize::Interval;
use crate::ledger::partitions::{encode_backlog_key, encode_backlog_prefix};
use crate::ledger::{BacklogRecord, Partition};
use crate::task::{Phase, Task};

pub struct Backlog;

fn parse_ttl(config: &Value) -> Result<Interval, String> {
    serde_json::from_value(config.clone()).map_err(|e| e.to_string())
}

fn stash(entry: &Entry, task: &str, expires: DateTime<Utc>) -> (Vec<u8>, BacklogRecord) {
    (
        encode_backlog_key(task, entry.uid()),
        BacklogRecord {
            task: task.to_string(),
            entry: entry.clone(),
            expires,
        },
    )
}

fn out_of_range(ttl: Interval) -> Outcome {
    Outcome::fatal(format!("backlog expiry {} from now is out of range", ttl))
}

impl Backlog {
    fn input(task: &mut Task, ttl: Interval) -> PluginResult {
        let now = Utc::now();
        let Some(expires) = ttl.after(now) else {
            return Ok(out_of_range(ttl));
        };
        let name = task.name().to_string();

        let stored = task
            .session()
            .scan_prefix(Partition::Backlog, &encode_backlog_prefix(&name))?;

        // remember what the inputs produced this run
        let current: Vec<(Vec<u8>, BacklogRecord)> = task
            .entries()
            .map(|entry| stash(entry, &name, expires))
            .collect();
        let present: HashSet<String> = task.entries().map(|e| e.url().to_string()).collect();

        for (key, mut record) in current {
            if let Some(previous) = task.session().get_json::<BacklogRecord>(Partition::Backlog, &key)? {
                record.expires = record.expires.max(previous.expires);
            }
            task.session().put_json(Partition::Backlog, &key, &record)?;
        }

        let mut injected = 0;
        for (key, raw) in stored {
            let record = match serde_json::from_slice::<BacklogRecord>(&raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!(task = %name, error = %e, "Dropping undecodable backlog record");
                    task.session().remove(Partition::Backlog, &key);
                    continue;
                }
            };

            if record.is_expired(now) {
                task.session().remove(Partition::Backlog, &key);
                continue;
            }
            if present.contains(record.entry.url()) {
                continue;
            }
            if task.add_entry(record.entry).is_some() {
                injected += 1;
            }
        }

        if injected > 0 {
            debug!(task = %name, injected, "Restored entries from backlog");
        }
        Ok(Outcome::Done)
    }

    fn learn(task: &mut Task) -> PluginResult {
        let keys: Vec<Vec<u8>> = task
            .accepted()
            .map(|entry| encode_backlog_key(task.name(), entry.uid()))
            .collect();
        for key in keys {
            task.session().remove(Partition::Backlog, &key);
        }
        Ok(Outcome::Done)
    }

    /// The session of an aborted pass is discarded, so write straight to the
    /// store; dry runs leave the ledger alone
    fn abort(task: &mut Task, ttl: Interval) -> PluginResult {
        if task.options().test {
            debug!(task = task.name(), "Test mode, aborted entries not kept in backlog");
            return Ok(Outcome::Done);
        }
        let Some(expires) = ttl.after(Utc::now()) else {
            return Ok(out_of_range(ttl));
        };
        let mut kept = 0;
        for entry in task.entries() {
            let (key, record) = stash(entry, task.name(), expires);
            task.store().put_json(Partition::Backlog, &key, &record)?;
            kept += 1;
        }
        if kept > 0 {
            task.store().persist()?;
            debug!(task = task.name(), kept, "Kept entries of aborted task in backlog");
        }
        Ok(Outcome::Done)
    }
}

#[async_trait]
impl Plugin for Backlog {
    async fn on_phase(&self, phase: Phase, task: &mut Task, config: &Value) -> PluginResult {
        let ttl = parse_ttl(config).map_err(PluginError::Config)?;
        match phase {
            Phase::Input => Self::input(task, ttl),
            Phase::Learn => Self::learn(task),
            Phase::Abort => Self::abort(task, ttl),
            _ => Ok(Outcome::Done),
        }
    }

    fn validate_config(&self, config: &Value) -> Result<(), String> {
        parse_ttl(config).map(|_| ())
    }
}
