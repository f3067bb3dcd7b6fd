//! Persistent log of the most recent entry failures

use chrono::Utc;
use tracing::debug;

use super::error::Result;
use super::partitions::{Partition, encode_failures_key};
use super::records::FailureRecord;
use super::store::FjallStore;
use crate::entry::Entry;

/// Number of failure records kept; the oldest is evicted first
pub const MAX_FAILURES: usize = 25;

/// Failure log written straight to the store, so failures survive an
/// aborted task
#[derive(Clone)]
pub struct FailureLog {
    store: FjallStore,
}

impl FailureLog {
    pub fn new(store: FjallStore) -> Self {
        Self { store }
    }

    /// Record a failure. The same title+url is kept once with a bumped count
    /// and moved to the most recent position.
    pub fn record(
        &self,
        task: &str,
        entry: &Entry,
        reason: Option<&str>,
        plugin: Option<&str>,
    ) -> Result<FailureRecord> {
        let now = Utc::now();
        let mut records = self.list()?;

        let record = match records
            .iter()
            .position(|r| r.title == entry.title() && r.url == entry.url())
        {
            Some(index) => {
                let mut existing = records.remove(index);
                existing.count += 1;
                existing.last_failed = now;
                existing.reason = reason.map(str::to_string);
                existing.task = task.to_string();
                existing.plugin = plugin.map(str::to_string);
                existing
            }
            None => FailureRecord {
                title: entry.title().to_string(),
                url: entry.url().to_string(),
                reason: reason.map(str::to_string),
                task: task.to_string(),
                plugin: plugin.map(str::to_string),
                count: 1,
                first_failed: now,
                last_failed: now,
            },
        };

        records.push(record.clone());
        if records.len() > MAX_FAILURES {
            let excess = records.len() - MAX_FAILURES;
            records.drain(..excess);
        }

        self.store
            .put_json(Partition::Failures, &encode_failures_key(), &records)?;
        debug!(title = %record.title, count = record.count, "Recorded failure");
        Ok(record)
    }

    /// Recent failures, oldest first
    pub fn list(&self) -> Result<Vec<FailureRecord>> {
        Ok(self
            .store
            .get_json(Partition::Failures, &encode_failures_key())?
            .unwrap_or_default())
    }

    /// Remove every record, returning how many were dropped
    pub fn clear(&self) -> Result<usize> {
        let count = self.list()?.len();
        self.store.remove(Partition::Failures, &encode_failures_key())?;
        Ok(count)
    }
}
