/// Partition names and key layout for the ledger
///
/// Partition structure:
/// - `simple`: `{scope}:{namespace}:{key}` -> SimpleRecord (JSON)
/// - `seen`: `seen:{scope}:{value}` -> SeenRecord (JSON)
/// - `backlog`: `backlog:{task}:{uid}` -> BacklogRecord (JSON)
/// - `delay`: `delay:{task}:{uid}` -> DelayRecord (JSON)
/// - `failures`: `failures:recent` -> Vec<FailureRecord> (JSON)
/// - `metadata`: `meta:{key}` -> value (string)
///
/// `{scope}` is `global` or `task/{name}`. Task names never contain `:`,
/// configuration validation enforces that.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Partition {
    Simple,
    Seen,
    Backlog,
    Delay,
    Failures,
    Metadata,
}

impl Partition {
    pub const ALL: [Partition; 6] = [
        Partition::Simple,
        Partition::Seen,
        Partition::Backlog,
        Partition::Delay,
        Partition::Failures,
        Partition::Metadata,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Partition::Simple => "simple",
            Partition::Seen => "seen",
            Partition::Backlog => "backlog",
            Partition::Delay => "delay",
            Partition::Failures => "failures",
            Partition::Metadata => "metadata",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Persistence scope: shared by every task, or private to one task
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Task(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Task(name) => write!(f, "task/{}", name),
        }
    }
}

/// Encode a simple persistence key: {scope}:{namespace}:{key}
pub fn encode_simple_key(scope: &Scope, namespace: &str, key: &str) -> Vec<u8> {
    format!("{}:{}:{}", scope, namespace, key).into_bytes()
}

/// Encode a seen key: seen:{scope}:{value}
pub fn encode_seen_key(scope: &Scope, value: &str) -> Vec<u8> {
    format!("seen:{}:{}", scope, value).into_bytes()
}

/// Decode a seen key: seen:{scope}:{value} -> (scope, value)
pub fn decode_seen_key(key: &[u8]) -> Option<(Scope, String)> {
    let key_str = std::str::from_utf8(key).ok()?;
    let rest = key_str.strip_prefix("seen:")?;
    let (scope, value) = rest.split_once(':')?;
    let scope = match scope.strip_prefix("task/") {
        Some(task) => Scope::Task(task.to_string()),
        None if scope == "global" => Scope::Global,
        None => return None,
    };
    Some((scope, value.to_string()))
}

/// Encode a backlog key: backlog:{task}:{uid}
pub fn encode_backlog_key(task: &str, uid: &str) -> Vec<u8> {
    format!("backlog:{}:{}", task, uid).into_bytes()
}

/// Encode a backlog prefix for range scan: backlog:{task}:
pub fn encode_backlog_prefix(task: &str) -> Vec<u8> {
    format!("backlog:{}:", task).into_bytes()
}

/// Encode a delay key: delay:{task}:{uid}
pub fn encode_delay_key(task: &str, uid: &str) -> Vec<u8> {
    format!("delay:{}:{}", task, uid).into_bytes()
}

/// Encode a delay prefix for range scan: delay:{task}:
pub fn encode_delay_prefix(task: &str) -> Vec<u8> {
    format!("delay:{}:", task).into_bytes()
}

/// Key holding the capped list of recent failures
pub fn encode_failures_key() -> Vec<u8> {
    b"failures:recent".to_vec()
}

/// Encode a metadata key: meta:{key}
pub fn encode_meta_key(key: &str) -> Vec<u8> {
    format!("meta:{}", key).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_key_encoding() {
        let key = encode_simple_key(&Scope::Task("tv".to_string()), "interval", "last_run");
        assert_eq!(key, b"task/tv:interval:last_run");

        let key = encode_simple_key(&Scope::Global, "auth", "token");
        assert_eq!(key, b"global:auth:token");
    }

    #[test]
    fn test_seen_key_encoding() {
        let key = encode_seen_key(&Scope::Global, "http://x/1");
        assert_eq!(key, b"seen:global:http://x/1");

        let (scope, value) = decode_seen_key(&key).unwrap();
        assert_eq!(scope, Scope::Global);
        assert_eq!(value, "http://x/1");

        let key = encode_seen_key(&Scope::Task("tv".to_string()), "Foo");
        let (scope, value) = decode_seen_key(&key).unwrap();
        assert_eq!(scope, Scope::Task("tv".to_string()));
        assert_eq!(value, "Foo");
    }

    #[test]
    fn test_decode_rejects_foreign_keys() {
        assert!(decode_seen_key(b"backlog:tv:abc").is_none());
        assert!(decode_seen_key(b"seen:elsewhere:abc").is_none());
    }

    #[test]
    fn test_backlog_prefix() {
        let key = encode_backlog_key("tv", "abc");
        let prefix = encode_backlog_prefix("tv");
        assert_eq!(prefix, b"backlog:tv:");
        assert!(key.starts_with(&prefix));
    }

    #[test]
    fn test_meta_key_encoding() {
        let key = encode_meta_key("last_prune");
        assert_eq!(key, b"meta:last_prune");
    }
}
