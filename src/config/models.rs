use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Plugin name -> plugin configuration, for one task
pub type TaskConfig = Map<String, Value>;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Reusable task fragments, merged into tasks through their `template` key
    #[serde(default)]
    pub templates: BTreeMap<String, TaskConfig>,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskConfig>,
}

/// Ledger (persistence) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
    /// Prune expired records after every execution
    #[serde(default = "default_prune_after_run")]
    pub prune_after_run: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
            prune_after_run: default_prune_after_run(),
        }
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/feedbox")
}

fn default_prune_after_run() -> bool {
    true
}

/// Task execution configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Upper bound on reruns a task may request in one execution
    #[serde(default = "default_max_reruns")]
    pub max_reruns: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_reruns: default_max_reruns(),
        }
    }
}

fn default_max_reruns() -> u32 {
    5
}

/// Logging configuration (`RUST_LOG` takes precedence)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.ledger.path, PathBuf::from("data/feedbox"));
        assert!(config.ledger.prune_after_run);
        assert_eq!(config.execution.max_reruns, 5);
        assert_eq!(config.logging.filter, "info");
        assert!(config.tasks.is_empty());
    }

    #[test]
    fn test_task_values_stay_loosely_typed() {
        let config: Config = toml::from_str(
            r#"
[tasks.tv]
accept_all = true
mock = [{ title = "Foo", url = "http://x/1" }]
regexp = { reject = ["Bar"] }
            "#,
        )
        .unwrap();

        let tv = &config.tasks["tv"];
        assert_eq!(tv["accept_all"], Value::Bool(true));
        assert_eq!(tv["mock"][0]["title"], "Foo");
        assert_eq!(tv["regexp"]["reject"][0], "Bar");
    }
}
