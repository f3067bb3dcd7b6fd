use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pipeline stages, in the order the executor runs them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Start,
    Input,
    Metainfo,
    Filter,
    Download,
    Modify,
    Output,
    Learn,
    Exit,
    /// Exceptional phase, run once after a task aborts
    Abort,
}

impl Phase {
    /// Regular phase order; `Abort` is not part of it
    pub const SEQUENCE: [Phase; 9] = [
        Phase::Start,
        Phase::Input,
        Phase::Metainfo,
        Phase::Filter,
        Phase::Download,
        Phase::Modify,
        Phase::Output,
        Phase::Learn,
        Phase::Exit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Input => "input",
            Phase::Metainfo => "metainfo",
            Phase::Filter => "filter",
            Phase::Download => "download",
            Phase::Modify => "modify",
            Phase::Output => "output",
            Phase::Learn => "learn",
            Phase::Exit => "exit",
            Phase::Abort => "abort",
        }
    }

    /// Phases a task is expected to have a configured plugin for
    pub fn expects_configured_plugin(&self) -> bool {
        matches!(self, Phase::Filter | Phase::Output)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::SEQUENCE
            .iter()
            .chain(std::iter::once(&Phase::Abort))
            .find(|p| p.name() == s)
            .copied()
            .ok_or_else(|| format!("unknown phase '{}'", s))
    }
}
