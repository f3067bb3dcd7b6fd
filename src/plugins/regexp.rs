use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::Value;

use super::traits::{Outcome, Plugin, PluginError, PluginResult};
use crate::entry::{EntryId, FIELD_TITLE};
use crate::task::{Phase, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Rest {
    Accept,
    Reject,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegexpConfig {
    #[serde(default, deserialize_with = "one_or_many")]
    accept: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    reject: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    from: Vec<String>,
    rest: Option<Rest>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

struct Rules {
    accept: Vec<Regex>,
    reject: Vec<Regex>,
    from: Vec<String>,
    rest: Option<Rest>,
}

impl Rules {
    fn compile(config: &Value) -> Result<Self, String> {
        let parsed: RegexpConfig = serde_json::from_value(config.clone()).map_err(|e| e.to_string())?;
        if parsed.accept.is_empty() && parsed.reject.is_empty() {
            return Err("at least one of accept or reject is required".to_string());
        }

        let compile = |patterns: &[String]| -> Result<Vec<Regex>, String> {
            patterns
                .iter()
                .map(|pattern| {
                    RegexBuilder::new(pattern)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| format!("invalid pattern '{}': {}", pattern, e))
                })
                .collect()
        };

        let from = if parsed.from.is_empty() {
            vec![FIELD_TITLE.to_string()]
        } else {
            parsed.from
        };

        Ok(Self {
            accept: compile(&parsed.accept)?,
            reject: compile(&parsed.reject)?,
            from,
            rest: parsed.rest,
        })
    }

    /// First pattern matching any of the configured fields of an entry
    fn find_match<'a>(&self, patterns: &'a [Regex], task: &Task, id: EntryId) -> Option<(&'a Regex, String)> {
        let entry = task.entry(id)?;
        for field in &self.from {
            let Some(text) = entry.get_str(field) else { continue };
            if let Some(pattern) = patterns.iter().find(|p| p.is_match(text)) {
                return Some((pattern, field.clone()));
            }
        }
        None
    }
}

/// Filter accepting or rejecting entries by case-insensitive regular expressions
///
/// Reject patterns apply to every entry, including accepted ones; accept
/// patterns only to undecided entries. `rest` decides what happens to
/// undecided entries no pattern matched.
pub struct Regexp;

#[async_trait]
impl Plugin for Regexp {
    async fn on_phase(&self, _phase: Phase, task: &mut Task, config: &Value) -> PluginResult {
        let rules = Rules::compile(config).map_err(PluginError::Config)?;
        let mut matched = Vec::new();

        for id in task.entry_ids() {
            if let Some((pattern, field)) = rules.find_match(&rules.reject, task, id) {
                let reason = format!("regexp '{}' matched field '{}'", pattern.as_str(), field);
                task.reject(id, Some(&reason))?;
                matched.push(id);
            }
        }

        for id in task.undecided_ids() {
            if let Some((pattern, field)) = rules.find_match(&rules.accept, task, id) {
                let reason = format!("regexp '{}' matched field '{}'", pattern.as_str(), field);
                task.accept(id, Some(&reason))?;
                matched.push(id);
            }
        }

        if let Some(rest) = rules.rest {
            for id in task.undecided_ids() {
                if matched.contains(&id) {
                    continue;
                }
                match rest {
                    Rest::Accept => task.accept(id, Some("regexp rest"))?,
                    Rest::Reject => task.reject(id, Some("regexp rest"))?,
                }
            }
        }

        Ok(Outcome::Done)
    }

    fn validate_config(&self, config: &Value) -> Result<(), String> {
        Rules::compile(config).map(|_| ())
    }
}
