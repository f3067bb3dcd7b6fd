use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use super::executor::{RunSummary, execute};
use crate::config::{Config, ConfigError, TaskConfig, ValidationError};
use crate::ledger::{FailureLog, FjallStore, LedgerError, pruning};
use crate::observability::{Metrics, MetricsSnapshot};
use crate::plugins::PluginRegistry;
use crate::task::{RunOptions, Task, TaskError};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("task '{task}' failed: {source}")]
    Task {
        task: String,
        #[source]
        source: TaskError,
    },
}

/// Owns configuration, plugin registry, ledger and metrics; runs tasks
pub struct Manager {
    config: Config,
    registry: PluginRegistry,
    tasks: BTreeMap<String, TaskConfig>,
    store: FjallStore,
    metrics: Arc<Metrics>,
}

impl Manager {
    /// Resolve and validate every task, then open the ledger
    pub fn new(config: Config, registry: PluginRegistry) -> Result<Self, ManagerError> {
        let tasks = Self::check(&config, &registry)?;
        let store = FjallStore::open(&config.ledger.path)?;
        info!(path = %config.ledger.path.display(), tasks = tasks.len(), "Ledger opened");
        Ok(Self::assemble(config, registry, tasks, store))
    }

    /// Same as [`Manager::new`] over an already open ledger
    pub fn with_store(
        config: Config,
        registry: PluginRegistry,
        store: FjallStore,
    ) -> Result<Self, ManagerError> {
        let tasks = Self::check(&config, &registry)?;
        Ok(Self::assemble(config, registry, tasks, store))
    }

    fn assemble(
        config: Config,
        registry: PluginRegistry,
        tasks: BTreeMap<String, TaskConfig>,
        store: FjallStore,
    ) -> Self {
        Self {
            config,
            registry,
            tasks,
            store,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Resolve templates and validate every task against the registry
    pub fn check(
        config: &Config,
        registry: &PluginRegistry,
    ) -> Result<BTreeMap<String, TaskConfig>, ManagerError> {
        let tasks = config.resolved_tasks()?;
        for (name, task_config) in &tasks {
            registry.validate(name, task_config)?;
        }
        Ok(tasks)
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.tasks.keys().map(String::as_str)
    }

    /// Resolved configuration of one task
    pub fn task_config(&self, name: &str) -> Option<&TaskConfig> {
        self.tasks.get(name)
    }

    pub fn store(&self) -> &FjallStore {
        &self.store
    }

    pub fn failure_log(&self) -> FailureLog {
        FailureLog::new(self.store.clone())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Run the selected tasks (all of them when `selection` is empty) one
    /// after the other, in name order
    ///
    /// A task that errors does not stop the others, unless `strict` is set.
    pub async fn execute(
        &self,
        selection: &[String],
        options: RunOptions,
    ) -> Result<Vec<RunSummary>, ManagerError> {
        let selected = self.select(selection)?;
        let mut summaries = Vec::with_capacity(selected.len());

        for (name, task_config) in selected {
            let mut task = Task::new(name, task_config.clone(), self.store.clone(), options.clone());
            self.metrics.task_run();

            let summary = match execute(&mut task, &self.registry, self.config.execution.max_reruns).await {
                Ok(summary) => summary,
                Err(e) if options.strict => {
                    self.metrics.task_aborted();
                    return Err(ManagerError::Task {
                        task: name.to_string(),
                        source: e,
                    });
                }
                Err(e) => {
                    error!(task = name, error = %e, "Task execution failed");
                    RunSummary::errored(name, &e)
                }
            };

            if summary.is_aborted() {
                self.metrics.task_aborted();
            }
            self.metrics
                .entries_decided(summary.accepted, summary.rejected, summary.failed);
            summaries.push(summary);
        }

        if self.config.ledger.prune_after_run && !options.test {
            let stats = pruning::prune_expired(&self.store)?;
            if stats.backlog_pruned > 0 {
                info!(pruned = stats.backlog_pruned, "Pruned expired backlog records");
            }
        } else {
            self.store.persist()?;
        }

        Ok(summaries)
    }

    fn select<'a>(&'a self, selection: &[String]) -> Result<Vec<(&'a str, &'a TaskConfig)>, ManagerError> {
        if selection.is_empty() {
            return Ok(self.tasks.iter().map(|(n, c)| (n.as_str(), c)).collect());
        }

        let mut selected = Vec::new();
        for wanted in selection {
            let (name, config) = self
                .tasks
                .get_key_value(wanted.as_str())
                .ok_or_else(|| ManagerError::UnknownTask(wanted.clone()))?;
            if selected.iter().any(|(n, _)| *n == name.as_str()) {
                warn!(task = %name, "Task selected twice, running it once");
                continue;
            }
            selected.push((name.as_str(), config));
        }
        selected.sort_by_key(|(name, _)| *name);
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn config(tasks: serde_json::Value) -> Config {
        let mut config = Config::default();
        for (name, body) in tasks.as_object().unwrap() {
            config
                .tasks
                .insert(name.clone(), body.as_object().cloned().unwrap());
        }
        config
    }

    fn manager(config: Config) -> (Manager, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FjallStore::open(dir.path()).unwrap();
        let manager = Manager::with_store(config, PluginRegistry::with_builtins(), store).unwrap();
        (manager, dir)
    }

    #[test]
    fn test_check_rejects_unknown_plugin() {
        let config = config(json!({"tv": {"mokc": []}}));
        let result = Manager::check(&config, &PluginRegistry::with_builtins());
        assert!(matches!(
            result,
            Err(ManagerError::Validation(ValidationError::UnknownPlugin { ref plugin, .. })) if plugin == "mokc"
        ));
    }

    #[tokio::test]
    async fn test_runs_tasks_in_name_order() {
        let (manager, _dir) = manager(config(json!({
            "zeta": {"mock": [{"title": "Z", "url": "http://z/1"}], "accept_all": true},
            "alpha": {"mock": [{"title": "A", "url": "http://a/1"}], "accept_all": true}
        })));

        let summaries = manager.execute(&[], RunOptions::default()).await.unwrap();
        let names: Vec<&str> = summaries.iter().map(|s| s.task.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(manager.metrics().tasks_run, 2);
        assert_eq!(manager.metrics().entries_accepted, 2);
    }

    #[tokio::test]
    async fn test_selection() {
        let (manager, _dir) = manager(config(json!({
            "a": {"accept_all": true},
            "b": {"accept_all": true}
        })));

        let summaries = manager
            .execute(&["b".to_string(), "b".to_string()], RunOptions::default())
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].task, "b");

        let unknown = manager.execute(&["c".to_string()], RunOptions::default()).await;
        assert!(matches!(unknown, Err(ManagerError::UnknownTask(name)) if name == "c"));
    }

    #[tokio::test]
    async fn test_failing_task_does_not_stop_others() {
        let (manager, _dir) = manager(config(json!({
            "broken": {"rss": "file:///nonexistent/feedbox.xml", "accept_all": true},
            "fine": {"mock": [{"title": "Foo", "url": "http://x/1"}], "accept_all": true}
        })));

        let summaries = manager.execute(&[], RunOptions::default()).await.unwrap();
        assert!(summaries[0].is_aborted());
        assert!(!summaries[1].is_aborted());
        assert_eq!(summaries[1].accepted, 1);
        assert_eq!(manager.metrics().tasks_aborted, 1);
    }

    #[tokio::test]
    async fn test_run_prunes_expired_backlog_outside_test_mode() {
        use crate::entry::Entry;
        use crate::ledger::partitions::encode_backlog_key;
        use crate::ledger::{BacklogRecord, Partition};

        let (manager, _dir) = manager(config(json!({
            "tv": {"mock": [{"title": "Foo", "url": "http://x/1"}], "accept_all": true}
        })));
        let stale = BacklogRecord {
            task: "old".to_string(),
            entry: Entry::new("Stale", "http://x/2"),
            expires: chrono::Utc::now() - chrono::Duration::hours(1),
        };
        let key = encode_backlog_key("old", stale.entry.uid());
        manager.store().put_json(Partition::Backlog, &key, &stale).unwrap();

        let dry = RunOptions::builder().test(true).build();
        manager.execute(&[], dry).await.unwrap();
        assert!(manager.store().get_raw(Partition::Backlog, &key).unwrap().is_some());

        manager.execute(&[], RunOptions::default()).await.unwrap();
        assert!(manager.store().get_raw(Partition::Backlog, &key).unwrap().is_none());
    }
}
