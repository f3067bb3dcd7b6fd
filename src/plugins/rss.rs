use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::traits::{Outcome, Plugin, PluginError, PluginResult};
use crate::entry::Entry;
use crate::humanize::Interval;
use crate::task::{Phase, Task};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cannot read feed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse feed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RssConfig {
    url: String,
    timeout: Option<Interval>,
}

impl RssConfig {
    fn parse(config: &Value) -> Result<Self, String> {
        match config {
            Value::String(url) => Ok(Self {
                url: url.clone(),
                timeout: None,
            }),
            Value::Object(_) => serde_json::from_value(config.clone()).map_err(|e| e.to_string()),
            other => Err(format!("expected a feed url or {{url, timeout}}, got {}", other)),
        }
    }
}

/// Input plugin reading RSS and Atom feeds over HTTP (or `file://`)
///
/// A failed fetch falls back to the entries of the last successful fetch of
/// the same url in this process, with a warning; with nothing cached the
/// task aborts.
pub struct RssInput {
    client: Client,
    cache: Mutex<HashMap<String, Vec<Entry>>>,
}

impl RssInput {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn fetch(&self, config: &RssConfig) -> Result<Vec<Entry>, FetchError> {
        let content = match config.url.strip_prefix("file://") {
            Some(path) => tokio::fs::read(path).await?,
            None => {
                let timeout = config.timeout.map(|t| t.as_duration()).unwrap_or(DEFAULT_TIMEOUT);
                self.client
                    .get(&config.url)
                    .timeout(timeout)
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await?
                    .to_vec()
            }
        };

        let feed = parser::parse(content.as_slice()).map_err(|e| FetchError::Parse(e.to_string()))?;

        let mut skipped = 0;
        let entries: Vec<Entry> = feed
            .entries
            .into_iter()
            .filter_map(|item| {
                let entry = convert(item);
                if entry.is_none() {
                    skipped += 1;
                }
                entry
            })
            .collect();

        debug!(url = %config.url, entries = entries.len(), skipped, "Parsed feed");
        Ok(entries)
    }

    fn cached(&self, url: &str) -> Option<Vec<Entry>> {
        let cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.get(url).cloned()
    }

    fn remember(&self, url: &str, entries: &[Entry]) {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.insert(url.to_string(), entries.to_vec());
    }
}

impl Default for RssInput {
    fn default() -> Self {
        Self::new()
    }
}

/// Feed item to entry; items without a title or link are dropped
fn convert(item: feed_rs::model::Entry) -> Option<Entry> {
    let title = item.title.map(|t| t.content).filter(|t| !t.trim().is_empty())?;
    let url = item
        .links
        .first()
        .map(|link| link.href.clone())
        .or_else(|| {
            item.media
                .iter()
                .flat_map(|media| media.content.iter())
                .find_map(|content| content.url.as_ref().map(|u| u.to_string()))
        })?;

    let mut entry = Entry::new(title.trim(), url);
    if !item.id.is_empty() {
        entry.set("guid", item.id);
    }
    if let Some(summary) = item.summary {
        entry.set("description", summary.content);
    }
    if let Some(published) = item.published.or(item.updated) {
        entry.set("published", published.to_rfc3339());
    }
    if let Some(author) = item.authors.first() {
        entry.set("author", author.name.clone());
    }
    Some(entry)
}

#[async_trait]
impl Plugin for RssInput {
    async fn on_phase(&self, _phase: Phase, task: &mut Task, config: &Value) -> PluginResult {
        let config = RssConfig::parse(config).map_err(PluginError::Config)?;

        let (entries, outcome) = match self.fetch(&config).await {
            Ok(entries) => {
                self.remember(&config.url, &entries);
                (entries, Outcome::Done)
            }
            Err(e) => match self.cached(&config.url) {
                Some(entries) => {
                    let message = format!(
                        "{} ({}), reusing {} entries from the last successful fetch",
                        config.url,
                        e,
                        entries.len()
                    );
                    (entries, Outcome::warning(message))
                }
                None => return Ok(Outcome::fatal(format!("{}: {}", config.url, e))),
            },
        };

        let total = entries.len();
        for entry in entries {
            task.add_entry(entry);
        }
        info!(task = task.name(), url = %config.url, entries = total, "Feed read");
        Ok(outcome)
    }

    fn validate_config(&self, config: &Value) -> Result<(), String> {
        let config = RssConfig::parse(config)?;
        if config.url.is_empty() {
            return Err("url must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::testing::{call, open_store, task_on, titles};
    use crate::task::RunOptions;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Shows</title>
    <link>http://example.com/</link>
    <description>test feed</description>
    <item>
      <title>Show.S01E01</title>
      <link>http://example.com/1</link>
      <guid>ep-1</guid>
      <description>pilot</description>
    </item>
    <item>
      <title>Show.S01E02</title>
      <link>http://example.com/2</link>
    </item>
    <item>
      <link>http://example.com/untitled</link>
    </item>
  </channel>
</rss>"#;

    fn write_feed(dir: &TempDir, content: &str) -> String {
        let path = dir.path().join("feed.xml");
        fs::write(&path, content).unwrap();
        format!("file://{}", path.display())
    }

    #[tokio::test]
    async fn test_reads_feed_file() {
        let (store, _dir) = open_store();
        let feed_dir = TempDir::new().unwrap();
        let url = write_feed(&feed_dir, FEED);

        let rss = RssInput::new();
        let mut task = task_on(&store, Value::Null, RunOptions::default());
        let outcome = call(&rss, "rss", Phase::Input, &mut task, &json!(url))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(titles(task.entries()), vec!["Show.S01E01", "Show.S01E02"]);
        let first = task.entries().next().unwrap();
        assert_eq!(first.url(), "http://example.com/1");
        assert_eq!(first.get_str("guid"), Some("ep-1"));
        assert_eq!(first.get_str("description"), Some("pilot"));
    }

    #[tokio::test]
    async fn test_failed_fetch_without_cache_is_fatal() {
        let (store, _dir) = open_store();
        let rss = RssInput::new();
        let mut task = task_on(&store, Value::Null, RunOptions::default());

        let outcome = call(
            &rss,
            "rss",
            Phase::Input,
            &mut task,
            &json!("file:///nonexistent/feedbox/feed.xml"),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, Outcome::Abort(_)));
    }

    #[tokio::test]
    async fn test_failed_fetch_reuses_last_result() {
        let (store, _dir) = open_store();
        let feed_dir = TempDir::new().unwrap();
        let url = write_feed(&feed_dir, FEED);
        let rss = RssInput::new();

        let mut first = task_on(&store, Value::Null, RunOptions::default());
        call(&rss, "rss", Phase::Input, &mut first, &json!(url))
            .await
            .unwrap();

        write_feed(&feed_dir, "this is not a feed");
        let mut second = task_on(&store, Value::Null, RunOptions::default());
        let outcome = call(&rss, "rss", Phase::Input, &mut second, &json!({"url": url}))
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Warning(_)));
        assert_eq!(second.entries().count(), 2);
    }

    #[test]
    fn test_validate_config() {
        let rss = RssInput::new();
        assert!(rss.validate_config(&json!("http://example.com/rss")).is_ok());
        assert!(rss.validate_config(&json!({"url": "http://x", "timeout": "10s"})).is_ok());
        assert!(rss.validate_config(&json!({"link": "http://x"})).is_err());
        assert!(rss.validate_config(&json!("")).is_err());
        assert!(rss.validate_config(&json!(1)).is_err());
    }
}
