//! Value types persisted in the ledger partitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entry::Entry;

/// Value stored through [`super::SimplePersistence`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleRecord {
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

/// A remembered field value of a previously processed entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeenRecord {
    pub task: String,
    pub title: String,
    pub field: String,
    pub value: String,
    pub local: bool,
    pub added: DateTime<Utc>,
}

/// Entry stashed for re-injection on a later run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacklogRecord {
    pub task: String,
    pub entry: Entry,
    pub expires: DateTime<Utc>,
}

impl BacklogRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

/// Entry held back until `release_at`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayRecord {
    pub task: String,
    pub entry: Entry,
    pub release_at: DateTime<Utc>,
}

impl DelayRecord {
    pub fn is_released(&self, now: DateTime<Utc>) -> bool {
        self.release_at <= now
    }
}

/// One row of the recent-failures log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub title: String,
    pub url: String,
    pub reason: Option<String>,
    pub task: String,
    pub plugin: Option<String>,
    pub count: u32,
    pub first_failed: DateTime<Utc>,
    pub last_failed: DateTime<Utc>,
}
