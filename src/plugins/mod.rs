//! Plugin system for feedbox
//!
//! Every phase of a task is handled by plugins. A plugin implements
//! [`Plugin`] and is registered with the phases it handles and a priority
//! per phase; the dispatcher runs the ones a task configures (plus builtins)
//! highest priority first.
//!
//! ## Key Components
//!
//! - [`Plugin`] - Phase handler trait
//! - [`Outcome`] / [`PluginError`] - Expected and unexpected handler results
//! - [`PluginRegistry`] - Registration records, candidate selection and
//!   config validation
//!
//! ## Example
//!
//! ```rust,ignore
//! use feedbox::plugins::PluginRegistry;
//! use feedbox::task::Phase;
//!
//! let registry = PluginRegistry::with_builtins();
//! for candidate in registry.candidates(Phase::Filter, &task_config) {
//!     println!("{} ({})", candidate.name, candidate.priority);
//! }
//! ```

mod accept_all;
mod backlog;
mod delay;
mod disable;
mod dump;
mod interval;
mod mock;
mod regexp;
mod registry;
mod rss;
pub mod seen;
mod set;
#[cfg(test)]
pub(crate) mod testing;
mod traits;

use std::sync::Arc;

pub use accept_all::AcceptAll;
pub use backlog::Backlog;
pub use delay::Delay;
pub use disable::Disable;
pub use dump::Dump;
pub use interval::IntervalGate;
pub use mock::MockInput;
pub use regexp::Regexp;
pub use registry::{ALL_BUILTINS, Candidate, DISABLE_KEY, PluginInfo, PluginRegistry, RegistryError};
pub use rss::RssInput;
pub use seen::Seen;
pub use set::SetFields;
pub use traits::{AbortKind, DEFAULT_PRIORITY, Outcome, Plugin, PluginError, PluginResult};

use crate::task::Phase;

impl PluginRegistry {
    /// Registry with every plugin shipped in this crate
    pub fn with_builtins() -> Self {
        let plugins = [
            PluginInfo::new(DISABLE_KEY, Arc::new(Disable)),
            PluginInfo::new("interval", Arc::new(IntervalGate))
                .on(Phase::Start, 255)
                .on_default(Phase::Exit),
            PluginInfo::new("mock", Arc::new(MockInput)).on_default(Phase::Input),
            PluginInfo::new("rss", Arc::new(RssInput::new())).on_default(Phase::Input),
            // after the regular inputs
            PluginInfo::new("backlog", Arc::new(Backlog))
                .on(Phase::Input, 1)
                .on_default(Phase::Learn)
                .on_default(Phase::Abort),
            PluginInfo::new("delay", Arc::new(Delay)).on(Phase::Input, -1),
            PluginInfo::new("set", Arc::new(SetFields)).on_default(Phase::Metainfo),
            PluginInfo::new("seen", Arc::new(Seen))
                .builtin()
                .on(Phase::Filter, 255)
                .on_default(Phase::Learn),
            PluginInfo::new("regexp", Arc::new(Regexp)).on_default(Phase::Filter),
            PluginInfo::new("accept_all", Arc::new(AcceptAll)).on_default(Phase::Filter),
            PluginInfo::new("dump", Arc::new(Dump)).on_default(Phase::Output),
        ];

        let mut registry = Self::new();
        for info in plugins {
            // names above are unique
            if let Err(e) = registry.register(info) {
                tracing::error!(error = %e, "Skipping plugin registration");
            }
        }
        registry
    }
}
