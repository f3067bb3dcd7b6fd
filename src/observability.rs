//! Tracing setup and run counters

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Counters over every task executed by one manager
#[derive(Debug, Default)]
pub struct Metrics {
    tasks_run: AtomicU64,
    tasks_aborted: AtomicU64,
    entries_accepted: AtomicU64,
    entries_rejected: AtomicU64,
    entries_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_run(&self) {
        self.tasks_run.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_run", "Metric incremented");
    }

    pub fn task_aborted(&self) {
        self.tasks_aborted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_aborted", "Metric incremented");
    }

    pub fn entries_decided(&self, accepted: usize, rejected: usize, failed: usize) {
        self.entries_accepted.fetch_add(accepted as u64, Ordering::Relaxed);
        self.entries_rejected.fetch_add(rejected as u64, Ordering::Relaxed);
        self.entries_failed.fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_run: self.tasks_run.load(Ordering::Relaxed),
            tasks_aborted: self.tasks_aborted.load(Ordering::Relaxed),
            entries_accepted: self.entries_accepted.load(Ordering::Relaxed),
            entries_rejected: self.entries_rejected.load(Ordering::Relaxed),
            entries_failed: self.entries_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub tasks_run: u64,
    pub tasks_aborted: u64,
    pub entries_accepted: u64,
    pub entries_rejected: u64,
    pub entries_failed: u64,
}
