use thiserror::Error;

use super::phase::Phase;
use crate::entry::EntryId;
use crate::ledger::LedgerError;
use crate::plugins::PluginError;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("entry {0} is not an entry of this task")]
    UnknownEntry(EntryId),

    #[error("entry '{title}' is invalid: {reason}")]
    InvalidEntry { title: String, reason: String },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("plugin '{plugin}' failed during {phase} phase: {source}")]
    Plugin {
        plugin: String,
        phase: Phase,
        #[source]
        source: Box<PluginError>,
    },
}

pub type Result<T> = std::result::Result<T, TaskError>;
