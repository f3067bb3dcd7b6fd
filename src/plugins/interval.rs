use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

use super::traits::{Outcome, Plugin, PluginError, PluginResult};
use crate::humanize::Interval;
use crate::task::{Phase, Task};

const NAMESPACE: &str = "interval";
const LAST_RUN: &str = "last_run";

/// Run a task at most once per interval
///
/// The start handler aborts the task silently while the interval since the
/// last successful run has not elapsed; `--now` and reruns bypass the check. The exit
/// handler only runs for passes that did not abort, and records the run.
pub struct IntervalGate;

fn parse_interval(config: &Value) -> Result<Interval, String> {
    serde_json::from_value(config.clone()).map_err(|e| e.to_string())
}

impl IntervalGate {
    fn start(task: &mut Task, interval: Interval) -> PluginResult {
        if task.options().now {
            info!(task = task.name(), "Ignoring interval because of --now");
            return Ok(Outcome::Done);
        }
        if task.reruns() > 0 {
            debug!(task = task.name(), rerun = task.reruns(), "Interval already checked on first pass");
            return Ok(Outcome::Done);
        }

        let last_run: Option<DateTime<Utc>> = task.persistence(NAMESPACE).get(LAST_RUN)?;
        let Some(last_run) = last_run else {
            debug!(task = task.name(), "No previous run recorded");
            return Ok(Outcome::Done);
        };

        let Some(next_run) = interval.after(last_run) else {
            return Ok(Outcome::fatal(format!(
                "next run {} after {} is out of range",
                interval, last_run
            )));
        };
        let now = Utc::now();
        if next_run > now {
            let wait = Interval::from_secs((next_run - now).num_seconds().max(0) as u64);
            task.abort_silently(format!("interval not met, next run in {}", wait));
        }
        Ok(Outcome::Done)
    }

    fn exit(task: &mut Task) -> PluginResult {
        let now = Utc::now();
        task.persistence(NAMESPACE).set(LAST_RUN, &now)?;
        debug!(task = task.name(), "Recorded last run");
        Ok(Outcome::Done)
    }
}

#[async_trait]
impl Plugin for IntervalGate {
    async fn on_phase(&self, phase: Phase, task: &mut Task, config: &Value) -> PluginResult {
        let interval = parse_interval(config).map_err(PluginError::Config)?;
        match phase {
            Phase::Start => Self::start(task, interval),
            Phase::Exit => Self::exit(task),
            _ => Ok(Outcome::Done),
        }
    }

    fn validate_config(&self, config: &Value) -> Result<(), String> {
        parse_interval(config).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FjallStore;
    use crate::plugins::testing::{call, open_store, task_on};
    use crate::task::RunOptions;
    use serde_json::json;

    async fn record_run(store: &FjallStore) {
        let mut task = task_on(store, Value::Null, RunOptions::default());
        call(&IntervalGate, "interval", Phase::Exit, &mut task, &json!("1 hour"))
            .await
            .unwrap();
        task.session().commit().unwrap();
    }

    #[tokio::test]
    async fn test_first_run_is_allowed() {
        let (store, _dir) = open_store();
        let mut task = task_on(&store, Value::Null, RunOptions::default());

        call(&IntervalGate, "interval", Phase::Start, &mut task, &json!("1 hour"))
            .await
            .unwrap();
        assert!(!task.is_aborted());
    }

    #[tokio::test]
    async fn test_aborts_silently_within_interval() {
        let (store, _dir) = open_store();
        record_run(&store).await;

        let mut task = task_on(&store, Value::Null, RunOptions::default());
        call(&IntervalGate, "interval", Phase::Start, &mut task, &json!("1 hour"))
            .await
            .unwrap();

        assert!(task.is_aborted());
        assert!(task.is_silent_abort());
        assert!(task.abort_reason().unwrap().starts_with("interval not met"));
    }

    #[tokio::test]
    async fn test_now_bypasses_interval() {
        let (store, _dir) = open_store();
        record_run(&store).await;

        let options = RunOptions::builder().now(true).build();
        let mut task = task_on(&store, Value::Null, options);
        call(&IntervalGate, "interval", Phase::Start, &mut task, &json!("1 hour"))
            .await
            .unwrap();
        assert!(!task.is_aborted());
    }

    #[tokio::test]
    async fn test_elapsed_interval_allows_run() {
        let (store, _dir) = open_store();
        record_run(&store).await;

        let mut task = task_on(&store, Value::Null, RunOptions::default());
        call(&IntervalGate, "interval", Phase::Start, &mut task, &json!(0))
            .await
            .unwrap();
        assert!(!task.is_aborted());
    }

    #[tokio::test]
    async fn test_reruns_skip_the_check() {
        let (store, _dir) = open_store();
        record_run(&store).await;

        let mut task = task_on(&store, Value::Null, RunOptions::default());
        task.reset_for_rerun();
        call(&IntervalGate, "interval", Phase::Start, &mut task, &json!("1 hour"))
            .await
            .unwrap();
        assert!(!task.is_aborted());
    }

    #[tokio::test]
    async fn test_unreachable_next_run_is_fatal() {
        let (store, _dir) = open_store();
        record_run(&store).await;

        let mut task = task_on(&store, Value::Null, RunOptions::default());
        let outcome = IntervalGate::start(&mut task, Interval::from_secs(u64::MAX)).unwrap();
        assert!(matches!(outcome, Outcome::Abort(_)));
        assert!(!task.is_aborted());
    }

    #[test]
    fn test_validate_config() {
        assert!(IntervalGate.validate_config(&json!("6 hours")).is_ok());
        assert!(IntervalGate.validate_config(&json!("often")).is_err());
        assert!(IntervalGate.validate_config(&json!(10_000_000_000_000_000u64)).is_err());
        assert!(IntervalGate.validate_config(&json!("3000000000000000000 weeks")).is_err());
    }
}
