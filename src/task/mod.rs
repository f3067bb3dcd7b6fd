//! Per-run task state and the entry state machine
//!
//! A [`Task`] owns the working list of entries of one pipeline run and the
//! derived accepted, rejected and failed subsets. Plugins move entries
//! between states through [`Task::accept`], [`Task::reject`] and
//! [`Task::fail`]; the dispatcher calls [`Task::purge`] after every handler
//! so rejected and failed entries leave the working set.
//!
//! Entries live in an arena and are addressed by [`EntryId`], so a purged
//! entry is still reachable through the rejected and failed lists.

mod error;
mod options;
mod phase;

pub use error::{Result, TaskError};
pub use options::RunOptions;
pub use phase::Phase;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::TaskConfig;
use crate::entry::{Decision, Entry, EntryId, EntryState};
use crate::ledger::{FailureLog, FjallStore, Scope, Session, SimplePersistence};

#[derive(Debug, Clone, PartialEq, Eq)]
struct AbortState {
    reason: String,
    silent: bool,
}

pub struct Task {
    name: String,
    config: Arc<TaskConfig>,
    options: RunOptions,
    run_id: Uuid,

    arena: Vec<Entry>,
    all: Vec<EntryId>,
    accepted: Vec<EntryId>,
    rejected: Vec<EntryId>,
    failed: Vec<EntryId>,

    abort: Option<AbortState>,
    abort_phase_ran: bool,
    rerun: Option<String>,
    reruns: u32,

    current_phase: Option<Phase>,
    current_plugin: Option<String>,
    timings: BTreeMap<String, Duration>,

    session: Session,
    failures: FailureLog,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        config: TaskConfig,
        store: FjallStore,
        options: RunOptions,
    ) -> Self {
        Self {
            name: name.into(),
            config: Arc::new(config),
            options,
            run_id: Uuid::new_v4(),
            arena: Vec::new(),
            all: Vec::new(),
            accepted: Vec::new(),
            rejected: Vec::new(),
            failed: Vec::new(),
            abort: None,
            abort_phase_ran: false,
            rerun: None,
            reruns: 0,
            current_phase: None,
            current_plugin: None,
            timings: BTreeMap::new(),
            session: Session::new(store.clone()),
            failures: FailureLog::new(store),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Shared handle to the resolved task configuration
    pub fn config(&self) -> Arc<TaskConfig> {
        Arc::clone(&self.config)
    }

    pub fn plugin_config(&self, plugin: &str) -> Option<&Value> {
        self.config.get(plugin)
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.current_phase
    }

    pub fn current_plugin(&self) -> Option<&str> {
        self.current_plugin.as_deref()
    }

    // ----- entries -----

    /// Add an entry to the working set. Invalid entries are logged and
    /// discarded.
    pub fn add_entry(&mut self, entry: Entry) -> Option<EntryId> {
        if let Err(reason) = entry.validate() {
            warn!(
                task = %self.name,
                plugin = self.current_plugin.as_deref().unwrap_or("-"),
                reason = %reason,
                "Discarding invalid entry {:?}",
                entry.fields()
            );
            return None;
        }

        let id = EntryId(self.arena.len());
        self.arena.push(entry);
        self.all.push(id);
        Some(id)
    }

    pub fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.arena.get(id.0)
    }

    pub fn entry_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        self.arena.get_mut(id.0)
    }

    /// Ids of the working set, in input order
    pub fn entry_ids(&self) -> Vec<EntryId> {
        self.all.clone()
    }

    /// Ids of working-set entries that have no decision yet
    pub fn undecided_ids(&self) -> Vec<EntryId> {
        self.all
            .iter()
            .copied()
            .filter(|id| self.arena[id.0].state() == EntryState::Undecided)
            .collect()
    }

    pub fn accepted_ids(&self) -> &[EntryId] {
        &self.accepted
    }

    pub fn rejected_ids(&self) -> &[EntryId] {
        &self.rejected
    }

    pub fn failed_ids(&self) -> &[EntryId] {
        &self.failed
    }

    /// Working set, in input order
    pub fn entries(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.resolve(&self.all)
    }

    /// Working-set entries paired with their ids
    pub fn entries_with_ids(&self) -> impl Iterator<Item = (EntryId, &Entry)> + '_ {
        self.all.iter().map(move |id| (*id, &self.arena[id.0]))
    }

    pub fn undecided(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.entries()
            .filter(|e| e.state() == EntryState::Undecided)
    }

    /// Accepted entries, in acceptance order
    pub fn accepted(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.resolve(&self.accepted)
    }

    pub fn rejected(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.resolve(&self.rejected)
    }

    pub fn failed(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.resolve(&self.failed)
    }

    fn resolve<'a>(&'a self, ids: &'a [EntryId]) -> impl Iterator<Item = &'a Entry> + 'a {
        ids.iter().map(move |id| &self.arena[id.0])
    }

    fn decision(&self, state: EntryState, reason: Option<&str>) -> Decision {
        Decision {
            state,
            reason: reason.map(str::to_string),
            plugin: self.current_plugin.clone(),
        }
    }

    fn log_decision(&self, verb: &str, entry: &Entry, reason: Option<&str>) {
        let plugin = self.current_plugin.as_deref().unwrap_or("-");
        let reason = reason.unwrap_or("");
        if self.options.details {
            info!(task = %self.name, plugin, reason, "{} {}", verb, entry.title());
        } else {
            debug!(task = %self.name, plugin, reason, "{} {}", verb, entry.title());
        }
    }

    // ----- state transitions -----

    /// Accept an undecided entry. Rejected or failed entries stay where they
    /// are (with a warning); invalid entries are refused.
    pub fn accept(&mut self, id: EntryId, reason: Option<&str>) -> Result<()> {
        let entry = self.entry(id).ok_or(TaskError::UnknownEntry(id))?;

        match entry.state() {
            EntryState::Accepted => return Ok(()),
            state @ (EntryState::Rejected | EntryState::Failed) => {
                warn!(
                    task = %self.name,
                    plugin = self.current_plugin.as_deref().unwrap_or("-"),
                    "Tried to accept {} entry {}, ignoring",
                    state,
                    entry.title()
                );
                return Ok(());
            }
            EntryState::Undecided => {}
        }

        if let Err(reason) = entry.validate() {
            return Err(TaskError::InvalidEntry {
                title: entry.title().to_string(),
                reason,
            });
        }

        self.log_decision("Accepting", entry, reason);
        let decision = self.decision(EntryState::Accepted, reason);
        self.arena[id.0].decide(decision);
        self.accepted.push(id);
        Ok(())
    }

    /// Reject an entry. Immortal entries are left untouched.
    pub fn reject(&mut self, id: EntryId, reason: Option<&str>) -> Result<()> {
        let entry = self.entry(id).ok_or(TaskError::UnknownEntry(id))?;

        if entry.is_immortal() {
            info!(
                task = %self.name,
                plugin = self.current_plugin.as_deref().unwrap_or("-"),
                reason = reason.unwrap_or(""),
                "Tried to reject immortal entry {}",
                entry.title()
            );
            return Ok(());
        }

        let was_accepted = match entry.state() {
            EntryState::Rejected | EntryState::Failed => return Ok(()),
            EntryState::Accepted => {
                warn!(
                    task = %self.name,
                    plugin = self.current_plugin.as_deref().unwrap_or("-"),
                    "Rejecting accepted entry {}",
                    entry.title()
                );
                true
            }
            EntryState::Undecided => false,
        };

        self.log_decision("Rejecting", entry, reason);
        if was_accepted {
            self.accepted.retain(|accepted| *accepted != id);
        }
        let decision = self.decision(EntryState::Rejected, reason);
        self.arena[id.0].decide(decision);
        self.rejected.push(id);
        Ok(())
    }

    /// Mark an entry failed and record it in the persistent failure log
    pub fn fail(&mut self, id: EntryId, reason: Option<&str>) -> Result<()> {
        let entry = self.entry(id).ok_or(TaskError::UnknownEntry(id))?;

        if entry.state() == EntryState::Failed {
            return Ok(());
        }

        warn!(
            task = %self.name,
            plugin = self.current_plugin.as_deref().unwrap_or("-"),
            reason = reason.unwrap_or(""),
            "Failed {}",
            entry.title()
        );
        self.failures
            .record(&self.name, entry, reason, self.current_plugin.as_deref())?;

        let decision = self.decision(EntryState::Failed, reason);
        self.arena[id.0].decide(decision);
        self.failed.push(id);
        Ok(())
    }

    /// Drop rejected entries from the working and accepted lists, and failed
    /// entries from all three lists
    pub fn purge(&mut self) {
        if self.rejected.is_empty() && self.failed.is_empty() {
            return;
        }

        let failed: HashSet<EntryId> = self.failed.iter().copied().collect();
        let gone: HashSet<EntryId> = self.rejected.iter().copied().chain(failed.iter().copied()).collect();

        self.all.retain(|id| !gone.contains(id));
        self.accepted.retain(|id| !gone.contains(id));
        self.rejected.retain(|id| !failed.contains(id));
    }

    // ----- abort & rerun -----

    /// Abort the task. Later calls keep the first reason.
    pub fn abort(&mut self, reason: impl Into<String>) {
        self.abort_with(reason.into(), false);
    }

    /// Abort without warning-level logging (e.g. interval not yet elapsed)
    pub fn abort_silently(&mut self, reason: impl Into<String>) {
        self.abort_with(reason.into(), true);
    }

    fn abort_with(&mut self, reason: String, silent: bool) {
        if self.abort.is_some() {
            return;
        }
        if silent {
            debug!(task = %self.name, reason = %reason, "Aborting task (silent)");
        } else {
            warn!(task = %self.name, reason = %reason, "Aborting task");
        }
        self.abort = Some(AbortState { reason, silent });
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_some()
    }

    pub fn abort_reason(&self) -> Option<&str> {
        self.abort.as_ref().map(|a| a.reason.as_str())
    }

    pub fn is_silent_abort(&self) -> bool {
        self.abort.as_ref().is_some_and(|a| a.silent)
    }

    /// Ask for another pass once this one completes
    pub fn rerun(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        info!(task = %self.name, reason = %reason, "Rerun requested");
        self.rerun = Some(reason);
    }

    pub fn rerun_requested(&self) -> Option<&str> {
        self.rerun.as_deref()
    }

    pub fn reruns(&self) -> u32 {
        self.reruns
    }

    // ----- persistence -----

    /// Staged ledger session of the current pass
    pub fn session(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn store(&self) -> &FjallStore {
        self.session.store()
    }

    pub fn failure_log(&self) -> &FailureLog {
        &self.failures
    }

    /// Key/value persistence private to this task
    pub fn persistence(&mut self, namespace: &str) -> SimplePersistence<'_> {
        SimplePersistence::new(&mut self.session, Scope::Task(self.name.clone()), namespace)
    }

    /// Key/value persistence shared by every task
    pub fn global_persistence(&mut self, namespace: &str) -> SimplePersistence<'_> {
        SimplePersistence::new(&mut self.session, Scope::Global, namespace)
    }

    // ----- executor hooks -----

    pub fn timings(&self) -> &BTreeMap<String, Duration> {
        &self.timings
    }

    pub(crate) fn set_cursor(&mut self, phase: Phase, plugin: Option<&str>) {
        self.current_phase = Some(phase);
        self.current_plugin = plugin.map(str::to_string);
    }

    pub(crate) fn clear_plugin_cursor(&mut self) {
        self.current_plugin = None;
    }

    pub(crate) fn add_timing(&mut self, plugin: &str, elapsed: Duration) {
        *self.timings.entry(plugin.to_string()).or_default() += elapsed;
    }

    /// True the first time it is called after an abort
    pub(crate) fn begin_abort_phase(&mut self) -> bool {
        if self.abort.is_none() || self.abort_phase_ran {
            return false;
        }
        self.abort_phase_ran = true;
        true
    }

    /// Forget this pass's entries before running the task again
    pub(crate) fn reset_for_rerun(&mut self) {
        self.arena.clear();
        self.all.clear();
        self.accepted.clear();
        self.rejected.clear();
        self.failed.clear();
        self.rerun = None;
        self.current_phase = None;
        self.current_plugin = None;
        self.reruns += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_task() -> (Task, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallStore::open(temp_dir.path().join("ledger")).unwrap();
        let task = Task::new("test", TaskConfig::new(), store, RunOptions::default());
        (task, temp_dir)
    }

    fn titles<'a>(entries: impl Iterator<Item = &'a Entry>) -> Vec<String> {
        entries.map(|e| e.title().to_string()).collect()
    }

    #[test]
    fn test_add_entry_discards_invalid() {
        let (mut task, _temp) = create_task();
        assert!(task.add_entry(Entry::new("Foo", "http://x/1")).is_some());

        let mut no_url = Entry::default();
        no_url.set("title", "Broken");
        assert!(!no_url.is_valid());
        assert!(task.add_entry(no_url).is_none());

        assert_eq!(titles(task.entries()), vec!["Foo"]);
    }

    #[test]
    fn test_accept_then_purge_keeps_entry() {
        let (mut task, _temp) = create_task();
        let id = task.add_entry(Entry::new("Foo", "http://x/1")).unwrap();

        task.accept(id, Some("looks good")).unwrap();
        task.purge();

        assert_eq!(titles(task.entries()), vec!["Foo"]);
        assert_eq!(titles(task.accepted()), vec!["Foo"]);
        assert_eq!(task.entry(id).unwrap().reason(), Some("looks good"));
    }

    #[test]
    fn test_accept_is_idempotent() {
        let (mut task, _temp) = create_task();
        let id = task.add_entry(Entry::new("Foo", "http://x/1")).unwrap();
        task.accept(id, None).unwrap();
        task.accept(id, None).unwrap();
        assert_eq!(task.accepted_ids().len(), 1);
    }

    #[test]
    fn test_accept_rejected_entry_is_ignored() {
        let (mut task, _temp) = create_task();
        let id = task.add_entry(Entry::new("Foo", "http://x/1")).unwrap();
        task.reject(id, None).unwrap();
        task.accept(id, None).unwrap();

        assert!(task.accepted_ids().is_empty());
        assert_eq!(task.rejected_ids(), &[id]);
    }

    #[test]
    fn test_accept_invalid_entry_is_refused() {
        let (mut task, _temp) = create_task();
        let id = task.add_entry(Entry::new("Foo", "http://x/1")).unwrap();
        task.entry_mut(id).unwrap().set("url", "");

        let result = task.accept(id, None);
        assert!(matches!(result, Err(TaskError::InvalidEntry { .. })));
        assert!(task.accepted_ids().is_empty());
    }

    #[test]
    fn test_unknown_entry() {
        let (mut task, _temp) = create_task();
        let result = task.accept(EntryId(7), None);
        assert!(matches!(result, Err(TaskError::UnknownEntry(_))));
        assert!(matches!(task.reject(EntryId(7), None), Err(TaskError::UnknownEntry(_))));
        assert!(matches!(task.fail(EntryId(7), None), Err(TaskError::UnknownEntry(_))));
    }

    #[test]
    fn test_reject_immortal_is_noop() {
        let (mut task, _temp) = create_task();
        let mut entry = Entry::new("Foo", "http://x/1");
        entry.set("immortal", true);
        let id = task.add_entry(entry).unwrap();

        task.reject(id, Some("no")).unwrap();
        task.purge();

        assert!(task.rejected_ids().is_empty());
        assert_eq!(titles(task.entries()), vec!["Foo"]);
    }

    #[test]
    fn test_reject_accepted_entry() {
        let (mut task, _temp) = create_task();
        let id = task.add_entry(Entry::new("Foo", "http://x/1")).unwrap();
        task.accept(id, None).unwrap();
        task.reject(id, Some("changed my mind")).unwrap();

        // never in both lists at once
        assert!(task.accepted_ids().is_empty());
        assert_eq!(task.rejected_ids(), &[id]);

        task.purge();
        assert_eq!(task.entries().count(), 0);
        assert_eq!(titles(task.rejected()), vec!["Foo"]);
    }

    #[test]
    fn test_purge_rejected_and_failed() {
        let (mut task, _temp) = create_task();
        let keep = task.add_entry(Entry::new("Keep", "http://x/1")).unwrap();
        let rejected = task.add_entry(Entry::new("Rejected", "http://x/2")).unwrap();
        let failed = task.add_entry(Entry::new("Failed", "http://x/3")).unwrap();

        task.accept(keep, None).unwrap();
        task.accept(failed, None).unwrap();
        task.reject(rejected, None).unwrap();
        task.fail(failed, Some("download error")).unwrap();
        task.purge();

        assert_eq!(titles(task.entries()), vec!["Keep"]);
        assert_eq!(titles(task.accepted()), vec!["Keep"]);
        assert_eq!(titles(task.rejected()), vec!["Rejected"]);
        assert_eq!(titles(task.failed()), vec!["Failed"]);
    }

    #[test]
    fn test_fail_twice_logs_once() {
        let (mut task, _temp) = create_task();
        let id = task.add_entry(Entry::new("Foo", "http://x/1")).unwrap();

        task.fail(id, Some("boom")).unwrap();
        task.fail(id, Some("boom")).unwrap();

        assert_eq!(task.failed_ids().len(), 1);
        let records = task.failure_log().list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].count, 1);
        assert_eq!(records[0].task, "test");
    }

    #[test]
    fn test_abort_keeps_first_reason() {
        let (mut task, _temp) = create_task();
        assert!(!task.is_aborted());

        task.abort("first");
        task.abort_silently("second");

        assert!(task.is_aborted());
        assert_eq!(task.abort_reason(), Some("first"));
        assert!(!task.is_silent_abort());

        assert!(task.begin_abort_phase());
        assert!(!task.begin_abort_phase());
    }

    #[test]
    fn test_decision_records_plugin() {
        let (mut task, _temp) = create_task();
        let id = task.add_entry(Entry::new("Foo", "http://x/1")).unwrap();
        task.set_cursor(Phase::Filter, Some("regexp"));
        task.reject(id, Some("matched")).unwrap();

        let decision = task.entry(id).unwrap().decision().unwrap();
        assert_eq!(decision.state, EntryState::Rejected);
        assert_eq!(decision.plugin.as_deref(), Some("regexp"));
    }

    #[test]
    fn test_reset_for_rerun() {
        let (mut task, _temp) = create_task();
        let id = task.add_entry(Entry::new("Foo", "http://x/1")).unwrap();
        task.accept(id, None).unwrap();
        task.rerun("more to do");

        task.reset_for_rerun();
        assert_eq!(task.entries().count(), 0);
        assert!(task.accepted_ids().is_empty());
        assert!(task.rerun_requested().is_none());
        assert_eq!(task.reruns(), 1);
    }
}
