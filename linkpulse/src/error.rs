//! Error kinds surfaced by the checking core.

use crate::message::BatchId;
use thiserror::Error;

/// Errors returned to callers of the core.
///
/// Probe failures never show up here: a failed check is recorded as an
/// `unavailable` link instead.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The submitted URL list was empty.
    #[error("URL list is empty")]
    InvalidInput,

    /// No batch with this id exists.
    #[error("batch {0} not found")]
    NotFound(BatchId),

    /// The service is draining and no longer accepts checks.
    #[error("service is shutting down")]
    ShuttingDown,

    /// A snapshot could not be decoded or violates the store invariants.
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),

    /// Reading or writing the snapshot file failed.
    #[error("snapshot I/O failed: {0}")]
    Persistence(#[from] std::io::Error),

    /// Encoding the snapshot failed.
    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}
