//! Scoped JSON key/value persistence for plugins

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::Result;
use super::partitions::{Partition, Scope, encode_simple_key};
use super::records::SimpleRecord;
use super::session::Session;

/// Key/value view over a session, scoped to global or one task and namespaced
/// (normally by plugin name)
pub struct SimplePersistence<'a> {
    session: &'a mut Session,
    scope: Scope,
    namespace: String,
}

impl<'a> SimplePersistence<'a> {
    pub fn new(session: &'a mut Session, scope: Scope, namespace: impl Into<String>) -> Self {
        Self {
            session,
            scope,
            namespace: namespace.into(),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Ok(self.record(key)?.map(|r| serde_json::from_value(r.value)).transpose()?)
    }

    /// Raw record including its last update time
    pub fn record(&self, key: &str) -> Result<Option<SimpleRecord>> {
        let key = encode_simple_key(&self.scope, &self.namespace, key);
        self.session.get_json(Partition::Simple, &key)
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let record = SimpleRecord {
            value: serde_json::to_value(value)?,
            updated_at: Utc::now(),
        };
        let key = encode_simple_key(&self.scope, &self.namespace, key);
        self.session.put_json(Partition::Simple, &key, &record)
    }

    pub fn remove(&mut self, key: &str) {
        let key = encode_simple_key(&self.scope, &self.namespace, key);
        self.session.remove(Partition::Simple, &key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FjallStore;
    use tempfile::TempDir;

    #[test]
    fn test_scopes_do_not_collide() {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallStore::open(temp_dir.path().join("ledger")).unwrap();
        let mut session = Session::new(store);

        SimplePersistence::new(&mut session, Scope::Task("a".into()), "counter")
            .set("n", &1u32)
            .unwrap();
        SimplePersistence::new(&mut session, Scope::Task("b".into()), "counter")
            .set("n", &2u32)
            .unwrap();
        SimplePersistence::new(&mut session, Scope::Global, "counter")
            .set("n", &3u32)
            .unwrap();

        let a: Option<u32> = SimplePersistence::new(&mut session, Scope::Task("a".into()), "counter")
            .get("n")
            .unwrap();
        let global: Option<u32> = SimplePersistence::new(&mut session, Scope::Global, "counter")
            .get("n")
            .unwrap();
        assert_eq!(a, Some(1));
        assert_eq!(global, Some(3));
    }

    #[test]
    fn test_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallStore::open(temp_dir.path().join("ledger")).unwrap();
        let mut session = Session::new(store);

        let mut kv = SimplePersistence::new(&mut session, Scope::Global, "ns");
        kv.set("key", &"value").unwrap();
        assert_eq!(kv.get::<String>("key").unwrap().as_deref(), Some("value"));
        kv.remove("key");
        assert!(kv.get::<String>("key").unwrap().is_none());
    }
}
