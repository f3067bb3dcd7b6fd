//! Staged ledger writes for one task pass
//!
//! Reads see the session's own pending writes first. Nothing reaches the
//! store until [`Session::commit`]; an aborted pass calls
//! [`Session::discard`] instead.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::Result;
use super::partitions::Partition;
use super::store::{FjallStore, WriteOp};

pub struct Session {
    store: FjallStore,
    pending: BTreeMap<(Partition, Vec<u8>), Option<Vec<u8>>>,
}

impl Session {
    pub fn new(store: FjallStore) -> Self {
        Self {
            store,
            pending: BTreeMap::new(),
        }
    }

    pub fn store(&self) -> &FjallStore {
        &self.store
    }

    pub fn get_raw(&self, partition: Partition, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.pending.get(&(partition, key.to_vec())) {
            Some(staged) => Ok(staged.clone()),
            None => self.store.get_raw(partition, key),
        }
    }

    pub fn get_json<T: DeserializeOwned>(&self, partition: Partition, key: &[u8]) -> Result<Option<T>> {
        match self.get_raw(partition, key)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    pub fn put_json<T: Serialize>(&mut self, partition: Partition, key: &[u8], value: &T) -> Result<()> {
        let value = serde_json::to_vec(value)?;
        self.pending.insert((partition, key.to_vec()), Some(value));
        Ok(())
    }

    pub fn remove(&mut self, partition: Partition, key: &[u8]) {
        self.pending.insert((partition, key.to_vec()), None);
    }

    /// Prefix scan over the store merged with pending writes
    pub fn scan_prefix(&self, partition: Partition, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .store
            .scan_prefix(partition, prefix)?
            .into_iter()
            .collect();

        for ((p, key), staged) in &self.pending {
            if *p != partition || !key.starts_with(prefix) {
                continue;
            }
            match staged {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    /// Prefix scan decoding every value as JSON
    pub fn scan_json<T: DeserializeOwned>(&self, partition: Partition, prefix: &[u8]) -> Result<Vec<(Vec<u8>, T)>> {
        self.scan_prefix(partition, prefix)?
            .into_iter()
            .map(|(key, value)| -> Result<(Vec<u8>, T)> {
                Ok((key, serde_json::from_slice(&value)?))
            })
            .collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Write every staged change to the store in one batch
    pub fn commit(&mut self) -> Result<usize> {
        let ops: Vec<WriteOp> = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|((partition, key), staged)| match staged {
                Some(value) => WriteOp::Put {
                    partition,
                    key,
                    value,
                },
                None => WriteOp::Remove { partition, key },
            })
            .collect();
        let count = ops.len();
        self.store.apply(ops)?;
        Ok(count)
    }

    /// Drop every staged change
    pub fn discard(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        if count > 0 {
            debug!(count, "Discarded staged ledger writes");
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn create_session() -> (Session, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallStore::open(temp_dir.path().join("ledger")).unwrap();
        (Session::new(store), temp_dir)
    }

    #[test]
    fn test_reads_see_pending_writes() {
        let (mut session, _temp) = create_session();
        session.put_json(Partition::Simple, b"k", &json!(1)).unwrap();

        let value: Option<Value> = session.get_json(Partition::Simple, b"k").unwrap();
        assert_eq!(value, Some(json!(1)));

        let stored: Option<Value> = session.store().get_json(Partition::Simple, b"k").unwrap();
        assert!(stored.is_none());
    }

    #[test]
    fn test_commit_applies_writes() {
        let (mut session, _temp) = create_session();
        session.store().put_raw(Partition::Simple, b"gone", b"1").unwrap();

        session.put_json(Partition::Simple, b"k", &json!("v")).unwrap();
        session.remove(Partition::Simple, b"gone");
        assert_eq!(session.commit().unwrap(), 2);
        assert_eq!(session.pending_len(), 0);

        let stored: Option<Value> = session.store().get_json(Partition::Simple, b"k").unwrap();
        assert_eq!(stored, Some(json!("v")));
        assert!(session.store().get_raw(Partition::Simple, b"gone").unwrap().is_none());
    }

    #[test]
    fn test_discard_drops_writes() {
        let (mut session, _temp) = create_session();
        session.put_json(Partition::Simple, b"k", &json!(1)).unwrap();
        assert_eq!(session.discard(), 1);
        session.commit().unwrap();

        assert!(session.store().get_raw(Partition::Simple, b"k").unwrap().is_none());
    }

    #[test]
    fn test_scan_merges_overlay() {
        let (mut session, _temp) = create_session();
        let store = session.store().clone();
        store.put_raw(Partition::Backlog, b"backlog:tv:a", b"1").unwrap();
        store.put_raw(Partition::Backlog, b"backlog:tv:b", b"2").unwrap();

        session.remove(Partition::Backlog, b"backlog:tv:a");
        session.put_json(Partition::Backlog, b"backlog:tv:c", &json!(3)).unwrap();
        session.put_json(Partition::Backlog, b"backlog:other:d", &json!(4)).unwrap();

        let keys: Vec<Vec<u8>> = session
            .scan_prefix(Partition::Backlog, b"backlog:tv:")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"backlog:tv:b".to_vec(), b"backlog:tv:c".to_vec()]);
    }
}
