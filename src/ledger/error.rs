use thiserror::Error;

use super::partitions::Partition;

/// Failures of the embedded ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("record encoding error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("partition '{0}' is not open")]
    UnknownPartition(Partition),

    #[error("ledger directory error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
