use bon::Builder;

/// Run-mode flags passed down from the command layer
#[derive(Debug, Clone, Default, Builder)]
pub struct RunOptions {
    /// Dry run: skip the learn phase and never commit ledger writes
    #[builder(default)]
    pub test: bool,
    /// Ignore interval gating
    #[builder(default)]
    pub now: bool,
    /// Return unexpected plugin errors to the caller instead of aborting
    #[builder(default)]
    pub strict: bool,
    /// Log per-entry decisions and plugin timings at info level
    #[builder(default)]
    pub details: bool,
}
