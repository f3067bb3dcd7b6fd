//! Configuration management for feedbox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use feedbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Ledger at: {}", config.ledger.path.display());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `FEEDBOX__<section>__<key>`
//!
//! Examples:
//! - `FEEDBOX__LEDGER__PATH=/var/lib/feedbox`
//! - `FEEDBOX__EXECUTION__MAX_RERUNS=3`
//! - `FEEDBOX__LOGGING__FILTER=feedbox=debug`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/feedbox.toml`.
//! This can be overridden using the `FEEDBOX_CONFIG` environment variable.

mod models;
mod resolver;
mod sources;
mod validation;

// Re-export public types
pub use crate::humanize::Interval;
pub use models::{Config, ExecutionConfig, LedgerConfig, LoggingConfig, TaskConfig};
pub use resolver::{GLOBAL_TEMPLATE, NO_GLOBAL, ResolverError, TEMPLATE_KEY, TemplateGraph, merge_into};
pub use sources::config_path;
pub use validation::{MAX_RERUNS_LIMIT, ValidationError};

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Template resolution failed: {0}")]
    ResolverError(#[from] ResolverError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`FEEDBOX__*`)
    /// 2. TOML file (default: `config/feedbox.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (no tasks, template cycles, invalid references, etc.)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get a template resolver for this configuration
    pub fn template_resolver(&self) -> TemplateGraph<'_> {
        TemplateGraph::new(&self.templates)
    }

    /// Effective config of every task, templates merged in
    pub fn resolved_tasks(&self) -> Result<BTreeMap<String, TaskConfig>, ConfigError> {
        Ok(self.template_resolver().resolve_all(&self.tasks)?)
    }
}
