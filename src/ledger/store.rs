use std::collections::HashMap;
use std::path::Path;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::error::{LedgerError, Result};
use super::partitions::Partition;

/// A single staged write, applied atomically by [`FjallStore::apply`]
#[derive(Debug, Clone)]
pub enum WriteOp {
    Put {
        partition: Partition,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Remove {
        partition: Partition,
        key: Vec<u8>,
    },
}

/// Fjall-backed persistent storage for cross-run plugin state
#[derive(Clone)]
pub struct FjallStore {
    keyspace: Keyspace,
    partitions: HashMap<Partition, PartitionHandle>,
}

impl FjallStore {
    /// Open or create a Fjall store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening ledger at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;

        let mut partitions = HashMap::new();
        for partition in Partition::ALL {
            let handle =
                keyspace.open_partition(partition.name(), PartitionCreateOptions::default())?;
            partitions.insert(partition, handle);
        }

        info!("Ledger opened successfully");
        Ok(Self {
            keyspace,
            partitions,
        })
    }

    pub(crate) fn handle(&self, partition: Partition) -> Result<&PartitionHandle> {
        self.partitions
            .get(&partition)
            .ok_or(LedgerError::UnknownPartition(partition))
    }

    pub fn get_raw(&self, partition: Partition, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.handle(partition)?.get(key)?.map(|v| v.to_vec()))
    }

    pub fn put_raw(&self, partition: Partition, key: &[u8], value: &[u8]) -> Result<()> {
        self.handle(partition)?.insert(key, value)?;
        Ok(())
    }

    pub fn remove(&self, partition: Partition, key: &[u8]) -> Result<()> {
        self.handle(partition)?.remove(key)?;
        Ok(())
    }

    pub fn get_json<T: DeserializeOwned>(&self, partition: Partition, key: &[u8]) -> Result<Option<T>> {
        match self.get_raw(partition, key)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    pub fn put_json<T: Serialize>(&self, partition: Partition, key: &[u8], value: &T) -> Result<()> {
        let value = serde_json::to_vec(value)?;
        self.put_raw(partition, key, &value)
    }

    /// All key/value pairs whose key starts with `prefix`, in key order
    pub fn scan_prefix(&self, partition: Partition, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut items = Vec::new();
        for item in self.handle(partition)?.prefix(prefix) {
            let (key, value) = item?;
            items.push((key.to_vec(), value.to_vec()));
        }
        Ok(items)
    }

    /// Apply a set of writes as one atomic batch
    pub fn apply(&self, ops: Vec<WriteOp>) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let count = ops.len();
        let mut batch = self.keyspace.batch();
        for op in ops {
            match op {
                WriteOp::Put {
                    partition,
                    key,
                    value,
                } => batch.insert(self.handle(partition)?, key, value),
                WriteOp::Remove { partition, key } => batch.remove(self.handle(partition)?, key),
            }
        }
        batch.commit()?;
        debug!(count, "Committed ledger batch");
        Ok(())
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}
