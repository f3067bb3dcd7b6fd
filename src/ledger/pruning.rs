//! Expiry of time-limited ledger records

use chrono::Utc;
use tracing::{debug, info};

use super::error::Result;
use super::partitions::{Partition, encode_meta_key};
use super::records::BacklogRecord;
use super::store::FjallStore;

/// Metadata key holding the last prune time (unix seconds)
const META_LAST_PRUNE: &str = "last_prune";

/// Pruning statistics
#[derive(Debug, Default)]
pub struct PruneStats {
    pub backlog_pruned: usize,
    pub undecodable_pruned: usize,
}

/// Prune expired entries from all expiring partitions
pub fn prune_expired(store: &FjallStore) -> Result<PruneStats> {
    let mut stats = PruneStats::default();

    prune_backlog(store, &mut stats)?;

    let now = Utc::now().timestamp();
    store.put_raw(
        Partition::Metadata,
        &encode_meta_key(META_LAST_PRUNE),
        now.to_string().as_bytes(),
    )?;

    store.persist()?;
    info!("Pruning complete: {:?}", stats);

    Ok(stats)
}

/// Remove backlog records past their expiry, and records that no longer decode
fn prune_backlog(store: &FjallStore, stats: &mut PruneStats) -> Result<()> {
    let now = Utc::now();

    for (key, value) in store.scan_prefix(Partition::Backlog, b"backlog:")? {
        match serde_json::from_slice::<BacklogRecord>(&value) {
            Ok(record) if record.is_expired(now) => {
                store.remove(Partition::Backlog, &key)?;
                stats.backlog_pruned += 1;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "Dropping undecodable backlog record");
                store.remove(Partition::Backlog, &key)?;
                stats.undecodable_pruned += 1;
            }
        }
    }

    info!("Pruned {} expired backlog entries", stats.backlog_pruned);
    Ok(())
}

/// Time of the last prune, if one ever ran
pub fn last_prune(store: &FjallStore) -> Result<Option<i64>> {
    Ok(store
        .get_raw(Partition::Metadata, &encode_meta_key(META_LAST_PRUNE))?
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;
    use crate::ledger::partitions::encode_backlog_key;
    use chrono::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_prune_removes_only_expired() {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallStore::open(temp_dir.path().join("ledger")).unwrap();

        let fresh = BacklogRecord {
            task: "tv".to_string(),
            entry: Entry::new("Fresh", "http://x/1"),
            expires: Utc::now() + Duration::hours(1),
        };
        let stale = BacklogRecord {
            task: "tv".to_string(),
            entry: Entry::new("Stale", "http://x/2"),
            expires: Utc::now() - Duration::hours(1),
        };
        store
            .put_json(Partition::Backlog, &encode_backlog_key("tv", fresh.entry.uid()), &fresh)
            .unwrap();
        store
            .put_json(Partition::Backlog, &encode_backlog_key("tv", stale.entry.uid()), &stale)
            .unwrap();
        store
            .put_raw(Partition::Backlog, b"backlog:tv:garbage", b"not json")
            .unwrap();

        let stats = prune_expired(&store).unwrap();
        assert_eq!(stats.backlog_pruned, 1);
        assert_eq!(stats.undecodable_pruned, 1);
        assert_eq!(store.scan_prefix(Partition::Backlog, b"backlog:").unwrap().len(), 1);
        assert!(last_prune(&store).unwrap().is_some());
    }
}
