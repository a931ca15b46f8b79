//! # Error Types
//!
//! Errors raised by the shared state store.

use thiserror::Error;

/// Errors that can occur while accessing a state partition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The partition was never created.
    #[error("Partition not found: {0}")]
    PartitionNotFound(String),

    /// A partition was opened while already checked out to a module.
    #[error("Partition {0} is already checked out")]
    PartitionBusy(String),

    /// Stored bytes could not be decoded into the expected value.
    #[error("Corrupt value under key {key} in partition {partition}: {reason}")]
    CorruptValue {
        partition: String,
        key: String,
        reason: String,
    },
}
