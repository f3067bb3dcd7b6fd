//! Phase sequencing for one task: abort handling, reruns and the ledger
//! session lifecycle

use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::dispatcher::run_phase;
use crate::plugins::PluginRegistry;
use crate::task::{Phase, Task, TaskError};

/// What one task execution produced
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub task: String,
    /// Entries left in the working set after the last pass
    pub entries: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
    pub aborted: Option<String>,
    pub silent_abort: bool,
    pub reruns: u32,
    /// Ledger writes committed over all passes
    pub committed: usize,
    pub elapsed: Duration,
    pub timings: BTreeMap<String, Duration>,
}

impl RunSummary {
    fn from_task(task: &Task, committed: usize, elapsed: Duration) -> Self {
        Self {
            task: task.name().to_string(),
            entries: task.entry_ids().len(),
            accepted: task.accepted_ids().len(),
            rejected: task.rejected_ids().len(),
            failed: task.failed_ids().len(),
            aborted: task.abort_reason().map(str::to_string),
            silent_abort: task.is_silent_abort(),
            reruns: task.reruns(),
            committed,
            elapsed,
            timings: task.timings().clone(),
        }
    }

    /// Summary for a task whose execution returned an error
    pub fn errored(task: &str, error: &TaskError) -> Self {
        Self {
            task: task.to_string(),
            aborted: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }
}

/// Execute a task: every phase in order, then reruns while requested and
/// allowed by `max_reruns`
///
/// Each pass's ledger session is committed when the pass completed without
/// abort outside test mode, and discarded otherwise.
pub async fn execute(
    task: &mut Task,
    registry: &PluginRegistry,
    max_reruns: u32,
) -> Result<RunSummary, TaskError> {
    let started = Instant::now();
    let mut committed = 0;

    info!(task = task.name(), run_id = %task.run_id(), "Running task");

    loop {
        if let Err(e) = run_pass(task, registry).await {
            task.session().discard();
            return Err(e);
        }

        if task.is_aborted() || task.options().test {
            let discarded = task.session().discard();
            if task.options().test && discarded > 0 {
                info!(task = task.name(), discarded, "Test mode, ledger changes not saved");
            }
        } else {
            committed += task.session().commit()?;
        }

        if task.is_aborted() {
            break;
        }

        let Some(reason) = task.rerun_requested().map(str::to_string) else {
            break;
        };
        if task.reruns() >= max_reruns {
            warn!(
                task = task.name(),
                reason = %reason,
                max_reruns,
                "Rerun requested but limit reached"
            );
            break;
        }
        task.reset_for_rerun();
        info!(task = task.name(), rerun = task.reruns(), reason = %reason, "Rerunning task");
    }

    let summary = RunSummary::from_task(task, committed, started.elapsed());
    log_summary(task, &summary);
    Ok(summary)
}

async fn run_pass(task: &mut Task, registry: &PluginRegistry) -> Result<(), TaskError> {
    let mut outcome = Ok(());

    for phase in Phase::SEQUENCE {
        if phase == Phase::Learn && task.options().test {
            debug!(task = task.name(), "Skipping learn phase in test mode");
            continue;
        }
        if let Err(e) = run_phase(task, registry, phase).await {
            outcome = Err(e);
            break;
        }
        if task.is_aborted() {
            break;
        }
    }

    if task.begin_abort_phase() {
        if let Err(e) = run_phase(task, registry, Phase::Abort).await {
            warn!(task = task.name(), error = %e, "Abort phase failed");
            if outcome.is_ok() {
                outcome = Err(e);
            }
        }
    }

    outcome
}

fn log_summary(task: &Task, summary: &RunSummary) {
    match &summary.aborted {
        Some(reason) if summary.silent_abort => {
            info!(task = task.name(), reason = %reason, "Task skipped");
        }
        Some(reason) => {
            warn!(task = task.name(), reason = %reason, "Task aborted");
        }
        None => {
            info!(
                task = task.name(),
                accepted = summary.accepted,
                rejected = summary.rejected,
                failed = summary.failed,
                reruns = summary.reruns,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "Task finished"
            );
        }
    }

    if task.options().details {
        for (plugin, elapsed) in &summary.timings {
            info!(task = task.name(), plugin = %plugin, elapsed_ms = elapsed.as_millis() as u64, "Plugin time");
        }
    }
}
