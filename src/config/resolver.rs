use super::models::TaskConfig;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Task key naming the templates a task pulls in
pub const TEMPLATE_KEY: &str = "template";
/// Template applied to every task unless it opts out
pub const GLOBAL_TEMPLATE: &str = "global";
/// Template list marker that skips the global template
pub const NO_GLOBAL: &str = "no_global";

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Template '{template}' referenced by '{referrer}' not found")]
    TemplateNotFound { referrer: String, template: String },

    #[error("Cycle detected in template chain: {0}")]
    CycleDetected(String),

    #[error("Invalid template reference in '{referrer}': {reason}")]
    InvalidReference { referrer: String, reason: String },
}

/// Template graph for resolving task configuration
///
/// A task (or template) names its templates under `template`, as a string
/// or a list. Templates are merged in order and may themselves reference
/// other templates. Values already present win, so a task always overrides
/// its templates, and lists are concatenated.
pub struct TemplateGraph<'a> {
    templates: &'a BTreeMap<String, TaskConfig>,
}

impl<'a> TemplateGraph<'a> {
    pub fn new(templates: &'a BTreeMap<String, TaskConfig>) -> Self {
        Self { templates }
    }

    /// Resolve one task config into its effective plugin map
    pub fn resolve(&self, task_name: &str, config: &TaskConfig) -> Result<TaskConfig, ResolverError> {
        let mut references = template_references(task_name, config)?;

        let skip_global = references.iter().any(|name| name == NO_GLOBAL);
        references.retain(|name| name != NO_GLOBAL);
        if !skip_global
            && self.templates.contains_key(GLOBAL_TEMPLATE)
            && !references.iter().any(|name| name == GLOBAL_TEMPLATE)
        {
            references.push(GLOBAL_TEMPLATE.to_string());
        }

        let mut resolved = config.clone();
        resolved.remove(TEMPLATE_KEY);

        let mut path = Vec::new();
        for template in references {
            self.apply(task_name, &template, &mut resolved, &mut path)?;
        }

        Ok(resolved)
    }

    fn apply(
        &self,
        referrer: &str,
        template: &str,
        target: &mut TaskConfig,
        path: &mut Vec<String>,
    ) -> Result<(), ResolverError> {
        // Cycle detection
        if path.iter().any(|seen| seen == template) {
            path.push(template.to_string());
            return Err(ResolverError::CycleDetected(path.join(" -> ")));
        }

        let config = self
            .templates
            .get(template)
            .ok_or_else(|| ResolverError::TemplateNotFound {
                referrer: referrer.to_string(),
                template: template.to_string(),
            })?;

        path.push(template.to_string());

        let mut body = config.clone();
        body.remove(TEMPLATE_KEY);
        merge_into(target, &body);

        for nested in template_references(template, config)? {
            if nested == NO_GLOBAL {
                continue;
            }
            self.apply(template, &nested, target, path)?;
        }

        path.pop();
        Ok(())
    }

    /// Resolve every task, keyed by task name
    pub fn resolve_all(
        &self,
        tasks: &BTreeMap<String, TaskConfig>,
    ) -> Result<BTreeMap<String, TaskConfig>, ResolverError> {
        let mut resolved = BTreeMap::new();

        for (name, config) in tasks {
            resolved.insert(name.clone(), self.resolve(name, config)?);
        }

        Ok(resolved)
    }
}

fn template_references(referrer: &str, config: &TaskConfig) -> Result<Vec<String>, ResolverError> {
    let invalid = |reason: &str| ResolverError::InvalidReference {
        referrer: referrer.to_string(),
        reason: reason.to_string(),
    };

    match config.get(TEMPLATE_KEY) {
        None => Ok(Vec::new()),
        Some(Value::String(name)) => Ok(vec![name.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid("template names must be strings"))
            })
            .collect(),
        Some(_) => Err(invalid("expected a template name or a list of names")),
    }
}

/// Merge `source` into `target`; existing scalars win, maps recurse, lists concatenate
pub fn merge_into(target: &mut TaskConfig, source: &TaskConfig) {
    for (key, incoming) in source {
        match (target.get_mut(key), incoming) {
            (None, _) => {
                target.insert(key.clone(), incoming.clone());
            }
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            (Some(Value::Array(existing)), Value::Array(incoming)) => {
                existing.extend(incoming.iter().cloned());
            }
            (Some(_), _) => {}
        }
    }
}
