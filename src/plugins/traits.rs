use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::task::{Phase, Task, TaskError};

/// Priority used when a plugin does not ask for one; higher runs first
pub const DEFAULT_PRIORITY: i32 = 128;

/// Unexpected plugin errors
///
/// `Task(TaskError::InvalidEntry)` is treated as an expected abort by the
/// dispatcher; everything else is a bug or an environment failure.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid plugin config: {0}")]
    Config(String),
    #[error("{0}")]
    Other(String),
}

/// Why a plugin aborted its task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortKind {
    /// Unrecoverable plugin failure
    Fatal(String),
    /// Something the plugin needs is not available
    MissingDependency { dependency: String, message: String },
}

/// Expected result of a plugin handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Warning(String),
    Abort(AbortKind),
}

impl Outcome {
    pub fn warning(message: impl Into<String>) -> Self {
        Outcome::Warning(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Outcome::Abort(AbortKind::Fatal(message.into()))
    }

    pub fn missing_dependency(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        Outcome::Abort(AbortKind::MissingDependency {
            dependency: dependency.into(),
            message: message.into(),
        })
    }
}

pub type PluginResult = Result<Outcome, PluginError>;

/// Phase handler implemented by every plugin
///
/// A plugin is registered for one or more phases; the dispatcher calls
/// `on_phase` once per registered phase with the plugin's slice of the task
/// configuration. Handlers run one at a time and mutate the task directly.
#[async_trait]
pub trait Plugin: Send + Sync {
    async fn on_phase(&self, phase: Phase, task: &mut Task, config: &Value) -> PluginResult;

    /// Check the plugin's configuration before any task runs
    fn validate_config(&self, _config: &Value) -> Result<(), String> {
        Ok(())
    }
}
