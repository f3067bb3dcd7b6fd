use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "FEEDBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/feedbox.toml";
const ENV_PREFIX: &str = "FEEDBOX";
const ENV_SEPARATOR: &str = "__";

/// Path of the configuration file: `FEEDBOX_CONFIG` or the default location
pub fn config_path() -> PathBuf {
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    load_from_sources(config_path())
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // FEEDBOX__LEDGER__PATH -> ledger.path
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.execution.max_reruns, 5);
        assert!(config.tasks.is_empty());
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[ledger]
path = "/var/lib/feedbox"

[execution]
max_reruns = 2

[tasks.news]
rss = "https://example.com/feed.xml"
accept_all = true
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.ledger.path, PathBuf::from("/var/lib/feedbox"));
        assert_eq!(config.execution.max_reruns, 2);
        assert_eq!(config.tasks.len(), 1);
        assert_eq!(config.tasks["news"]["rss"], "https://example.com/feed.xml");
    }

    // Environment overrides are not exercised here: env::set_var is unsafe
    // under edition 2024 and would race with parallel tests

    #[test]
    fn test_complex_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[logging]
filter = "feedbox=debug"

[templates.global]
seen = "local"

[templates.tv]
regexp = { reject = ["cam", "ts"] }

[tasks.shows]
template = ["tv"]
mock = [
  { title = "Show.S01E01", url = "http://x/1" },
  { title = "Show.S01E01.CAM", url = "http://x/2" },
]
accept_all = true
interval = "2 hours"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();

        assert_eq!(config.logging.filter, "feedbox=debug");
        assert_eq!(config.templates.len(), 2);
        assert_eq!(config.tasks.len(), 1);

        let shows = &config.tasks["shows"];
        assert_eq!(shows["mock"].as_array().unwrap().len(), 2);
        assert_eq!(shows["interval"], "2 hours");
    }
}
