use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use super::traits::{DEFAULT_PRIORITY, Plugin};
use crate::config::{TEMPLATE_KEY, TaskConfig, ValidationError};
use crate::task::Phase;

/// Task config key listing builtins to switch off
pub const DISABLE_KEY: &str = "disable";
/// `disable` value switching off every builtin
pub const ALL_BUILTINS: &str = "builtins";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("plugin already registered: {0}")]
    Duplicate(String),
}

/// Registration record of one plugin
#[derive(Clone)]
pub struct PluginInfo {
    name: String,
    phases: BTreeMap<Phase, i32>,
    builtin: bool,
    sequence: usize,
    plugin: Arc<dyn Plugin>,
}

impl PluginInfo {
    pub fn new(name: impl Into<String>, plugin: Arc<dyn Plugin>) -> Self {
        Self {
            name: name.into(),
            phases: BTreeMap::new(),
            builtin: false,
            sequence: 0,
            plugin,
        }
    }

    /// Run for every task unless disabled, configured or not
    pub fn builtin(mut self) -> Self {
        self.builtin = true;
        self
    }

    /// Handle `phase` at `priority`
    pub fn on(mut self, phase: Phase, priority: i32) -> Self {
        self.phases.insert(phase, priority);
        self
    }

    /// Handle `phase` at the default priority
    pub fn on_default(self, phase: Phase) -> Self {
        self.on(phase, DEFAULT_PRIORITY)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    pub fn priority(&self, phase: Phase) -> Option<i32> {
        self.phases.get(&phase).copied()
    }

    pub fn plugin(&self) -> Arc<dyn Plugin> {
        Arc::clone(&self.plugin)
    }
}

impl std::fmt::Debug for PluginInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInfo")
            .field("name", &self.name)
            .field("phases", &self.phases)
            .field("builtin", &self.builtin)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// A plugin selected to handle one phase of one task
#[derive(Clone)]
pub struct Candidate {
    pub name: String,
    pub priority: i32,
    pub builtin: bool,
    pub plugin: Arc<dyn Plugin>,
}

/// Registry mapping plugin names to registration records
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, PluginInfo>,
    next_sequence: usize,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, mut info: PluginInfo) -> Result<(), RegistryError> {
        if self.plugins.contains_key(&info.name) {
            return Err(RegistryError::Duplicate(info.name));
        }
        info.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.plugins.insert(info.name.clone(), info);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PluginInfo> {
        self.plugins.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Plugins that handle `phase` for a task with `config`, highest priority
    /// first; equal priorities keep registration order
    pub fn candidates(&self, phase: Phase, config: &TaskConfig) -> Vec<Candidate> {
        let disabled = DisabledBuiltins::from_config(config);

        let mut selected: Vec<(usize, Candidate)> = self
            .plugins
            .values()
            .filter_map(|info| {
                let priority = info.priority(phase)?;
                let configured = match config.get(&info.name) {
                    Some(Value::Bool(false)) => return None,
                    Some(_) => true,
                    None => false,
                };
                let enabled = configured || (info.builtin && !disabled.contains(&info.name));
                enabled.then(|| {
                    (
                        info.sequence,
                        Candidate {
                            name: info.name.clone(),
                            priority,
                            builtin: info.builtin,
                            plugin: info.plugin(),
                        },
                    )
                })
            })
            .collect();

        selected.sort_by_key(|(sequence, _)| *sequence);
        selected.sort_by_key(|(_, candidate)| std::cmp::Reverse(candidate.priority));
        selected.into_iter().map(|(_, candidate)| candidate).collect()
    }

    /// Check every key of a resolved task config names a registered plugin
    /// with an acceptable configuration
    pub fn validate(&self, task: &str, config: &TaskConfig) -> Result<(), ValidationError> {
        for (name, value) in config {
            if name == TEMPLATE_KEY {
                continue;
            }

            let info = self.plugins.get(name).ok_or_else(|| ValidationError::UnknownPlugin {
                task: task.to_string(),
                plugin: name.clone(),
            })?;

            if matches!(value, Value::Bool(false)) {
                continue;
            }

            info.plugin
                .validate_config(value)
                .map_err(|message| ValidationError::InvalidPluginConfig {
                    task: task.to_string(),
                    plugin: name.clone(),
                    message,
                })?;
        }
        Ok(())
    }
}

/// Builtins switched off through the task's `disable` key
enum DisabledBuiltins {
    None,
    All,
    Named(Vec<String>),
}

impl DisabledBuiltins {
    fn from_config(config: &TaskConfig) -> Self {
        match config.get(DISABLE_KEY) {
            Some(Value::String(name)) if name == ALL_BUILTINS => DisabledBuiltins::All,
            Some(Value::String(name)) => DisabledBuiltins::Named(vec![name.clone()]),
            Some(Value::Array(items)) => {
                let names: Vec<String> = items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                if names.iter().any(|name| name == ALL_BUILTINS) {
                    DisabledBuiltins::All
                } else {
                    DisabledBuiltins::Named(names)
                }
            }
            _ => DisabledBuiltins::None,
        }
    }

    fn contains(&self, name: &str) -> bool {
        match self {
            DisabledBuiltins::None => false,
            DisabledBuiltins::All => true,
            DisabledBuiltins::Named(names) => names.iter().any(|n| n == name),
        }
    }
}
