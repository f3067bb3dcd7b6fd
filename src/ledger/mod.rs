/// Fjall-based persistence for state that outlives a single task run
///
/// This module provides durable storage for the small amount of state that
/// plugins carry between runs. It uses Fjall (an embedded LSM key-value store)
/// to persist:
///
/// - Simple scoped key/value records (e.g. interval last-run times)
/// - Seen fingerprints of previously processed entries
/// - Backlog and delay queues of stashed entries
/// - The capped log of recent entry failures
/// - Metadata (pruning state)
///
/// ## Sessions
///
/// Each task pass writes through a [`Session`]. The executor commits it in
/// one batch when the pass completes without aborting and discards it
/// otherwise. The failure log is the exception: it writes straight to the
/// store so failures are kept even when the task aborts.
///
/// ## Usage
///
/// ```rust,ignore
/// use feedbox::ledger::{FjallStore, Scope, Session, SimplePersistence};
///
/// let store = FjallStore::open("data/feedbox")?;
/// let mut session = Session::new(store.clone());
/// SimplePersistence::new(&mut session, Scope::Global, "example").set("key", &42)?;
/// session.commit()?;
/// ```

pub mod error;
pub mod failures;
pub mod partitions;
pub mod pruning;
pub mod records;
pub mod session;
pub mod simple;
pub mod store;

pub use error::{LedgerError, Result};
pub use failures::{FailureLog, MAX_FAILURES};
pub use partitions::{Partition, Scope};
pub use pruning::PruneStats;
pub use records::{BacklogRecord, DelayRecord, FailureRecord, SeenRecord, SimpleRecord};
pub use session::Session;
pub use simple::SimplePersistence;
pub use store::{FjallStore, WriteOp};
