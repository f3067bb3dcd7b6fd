//! Entry: one content item flowing through a task
//!
//! An entry is an open-ended map of field name to JSON value. Two fields are
//! mandatory for an entry to be valid: `title` and `url`. The first `url`
//! ever set is also kept as `original_url`, and a `uid` derived from the
//! title and original url is recomputed whenever either changes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

pub const FIELD_TITLE: &str = "title";
pub const FIELD_URL: &str = "url";
pub const FIELD_ORIGINAL_URL: &str = "original_url";
pub const FIELD_IMMORTAL: &str = "immortal";

/// Handle to an entry inside a task's entry arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub(crate) usize);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Undecided,
    Accepted,
    Rejected,
    Failed,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntryState::Undecided => "undecided",
            EntryState::Accepted => "accepted",
            EntryState::Rejected => "rejected",
            EntryState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Who decided an entry's state, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub state: EntryState,
    pub reason: Option<String>,
    pub plugin: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Entry {
    fields: Map<String, Value>,
    uid: String,
    decision: Option<Decision>,
}

impl Entry {
    /// Create an entry with the two mandatory fields set
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        let mut entry = Self::default();
        entry.set(FIELD_TITLE, title.into());
        entry.set(FIELD_URL, url.into());
        entry
    }

    /// Build an entry from a raw field map, capturing `original_url` if absent
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        let mut entry = Self::default();
        // original_url goes first so a stored provenance survives the url write
        if let Some(original) = fields.get(FIELD_ORIGINAL_URL) {
            entry
                .fields
                .insert(FIELD_ORIGINAL_URL.to_string(), original.clone());
        }
        for (key, value) in fields {
            entry.set(key, value);
        }
        entry.refresh_uid();
        entry
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String value of a field, if it is a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Set a field. Setting `url` for the first time also sets `original_url`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();

        if key == FIELD_URL && !self.fields.contains_key(FIELD_ORIGINAL_URL) {
            self.fields
                .insert(FIELD_ORIGINAL_URL.to_string(), value.clone());
        }

        let refresh = key == FIELD_TITLE || key == FIELD_URL;
        self.fields.insert(key, value);
        if refresh {
            self.refresh_uid();
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.fields.remove(key);
        if key == FIELD_TITLE || key == FIELD_URL {
            self.refresh_uid();
        }
        removed
    }

    pub fn title(&self) -> &str {
        self.get_str(FIELD_TITLE).unwrap_or_default()
    }

    pub fn url(&self) -> &str {
        self.get_str(FIELD_URL).unwrap_or_default()
    }

    pub fn original_url(&self) -> Option<&str> {
        self.get_str(FIELD_ORIGINAL_URL)
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Valid iff `title` and `url` are both non-empty strings
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Describe the first validity violation, if any
    pub fn validate(&self) -> Result<(), String> {
        for field in [FIELD_TITLE, FIELD_URL] {
            match self.fields.get(field) {
                Some(Value::String(s)) if !s.is_empty() => {}
                Some(Value::String(_)) => return Err(format!("field '{}' is empty", field)),
                Some(_) => return Err(format!("field '{}' is not text", field)),
                None => return Err(format!("field '{}' is missing", field)),
            }
        }
        Ok(())
    }

    /// Immortal entries cannot be rejected
    pub fn is_immortal(&self) -> bool {
        is_truthy(self.fields.get(FIELD_IMMORTAL))
    }

    pub fn state(&self) -> EntryState {
        self.decision
            .as_ref()
            .map(|d| d.state)
            .unwrap_or(EntryState::Undecided)
    }

    pub fn decision(&self) -> Option<&Decision> {
        self.decision.as_ref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.decision.as_ref().and_then(|d| d.reason.as_deref())
    }

    pub(crate) fn decide(&mut self, decision: Decision) {
        self.decision = Some(decision);
    }

    fn refresh_uid(&mut self) {
        let mut hasher = Sha256::new();
        hasher.update(self.title().as_bytes());
        hasher.update(b"\0");
        hasher.update(self.original_url().unwrap_or_default().as_bytes());
        self.uid = hex::encode(hasher.finalize());
    }
}

impl From<Map<String, Value>> for Entry {
    fn from(fields: Map<String, Value>) -> Self {
        Entry::from_fields(fields)
    }
}

impl From<Entry> for Map<String, Value> {
    fn from(entry: Entry) -> Self {
        entry.fields
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title(), self.url())
    }
}

/// Python-ish truthiness for loosely typed config and entry flags
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}
