use super::models::{Config, TaskConfig};
use super::resolver::{NO_GLOBAL, TEMPLATE_KEY};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Upper bound for `execution.max_reruns`
pub const MAX_RERUNS_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("No tasks configured (at least one entry under [tasks] is required)")]
    NoTasksConfigured,

    #[error("Invalid task name '{name}': {reason}")]
    InvalidTaskName { name: String, reason: String },

    #[error("'{referrer}' references non-existent template '{template}'")]
    InvalidTemplateReference { referrer: String, template: String },

    #[error("Template cycle detected: {path}")]
    TemplateCycle { path: String },

    #[error("Task '{task}' uses unknown plugin '{plugin}'")]
    UnknownPlugin { task: String, plugin: String },

    #[error("Task '{task}' has invalid configuration for plugin '{plugin}': {message}")]
    InvalidPluginConfig {
        task: String,
        plugin: String,
        message: String,
    },

    #[error("execution.max_reruns ({actual}) exceeds limit of {limit}")]
    InvalidMaxReruns { actual: u32, limit: u32 },

    #[error("ledger.path must not be empty")]
    EmptyLedgerPath,
}

/// Validate the entire configuration
///
/// Plugin names and plugin configs are checked later, against the registry.
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_tasks(config)?;
    validate_templates(config)?;
    validate_execution(config)?;
    validate_ledger(config)?;
    Ok(())
}

fn validate_tasks(config: &Config) -> Result<(), ValidationError> {
    if config.tasks.is_empty() {
        return Err(ValidationError::NoTasksConfigured);
    }

    for name in config.tasks.keys() {
        let reason = if name.trim().is_empty() {
            Some("name is empty")
        } else if name.contains(':') {
            // ':' separates key segments in the ledger
            Some("name must not contain ':'")
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(ValidationError::InvalidTaskName {
                name: name.clone(),
                reason: reason.to_string(),
            });
        }
    }

    Ok(())
}

/// Check template references exist and template chains are acyclic
fn validate_templates(config: &Config) -> Result<(), ValidationError> {
    let sources = config.tasks.iter().chain(config.templates.iter());
    for (name, body) in sources {
        for template in references(body) {
            if !config.templates.contains_key(&template) {
                return Err(ValidationError::InvalidTemplateReference {
                    referrer: name.clone(),
                    template,
                });
            }
        }
    }

    // Detect cycles using DFS
    let mut visited = HashSet::new();
    for name in config.templates.keys() {
        detect_cycles(name, &config.templates, &mut visited, &mut Vec::new())?;
    }

    Ok(())
}

/// DFS-based cycle detection over template references
fn detect_cycles(
    current: &str,
    templates: &BTreeMap<String, TaskConfig>,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Result<(), ValidationError> {
    if path.iter().any(|seen| seen == current) {
        path.push(current.to_string());
        return Err(ValidationError::TemplateCycle {
            path: path.join(" -> "),
        });
    }

    if visited.contains(current) {
        return Ok(());
    }

    visited.insert(current.to_string());
    path.push(current.to_string());

    if let Some(body) = templates.get(current) {
        for next in references(body) {
            detect_cycles(&next, templates, visited, path)?;
        }
    }

    path.pop();
    Ok(())
}

/// Template names referenced by a task or template body, ignoring `no_global`
fn references(body: &TaskConfig) -> Vec<String> {
    let names = match body.get(TEMPLATE_KEY) {
        Some(Value::String(name)) => vec![name.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    names.into_iter().filter(|name| name != NO_GLOBAL).collect()
}

fn validate_execution(config: &Config) -> Result<(), ValidationError> {
    if config.execution.max_reruns > MAX_RERUNS_LIMIT {
        return Err(ValidationError::InvalidMaxReruns {
            actual: config.execution.max_reruns,
            limit: MAX_RERUNS_LIMIT,
        });
    }
    Ok(())
}

fn validate_ledger(config: &Config) -> Result<(), ValidationError> {
    if config.ledger.path.as_os_str().is_empty() {
        return Err(ValidationError::EmptyLedgerPath);
    }
    Ok(())
}
