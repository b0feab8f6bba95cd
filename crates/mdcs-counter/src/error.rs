//! Error types for counter contexts.

use crate::replica_id::ReplicaId;
use thiserror::Error;

/// Errors that can occur while decoding, building or merging counter contexts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// The byte encoding is truncated or internally inconsistent.
    #[error("Malformed counter context: {0}")]
    MalformedContext(String),

    /// Two shards agree on replica and clock but not on count.
    #[error("Clock/count mismatch for replica {replica} at clock {clock}: {left} vs {right}")]
    ClockCountMismatch {
        replica: ReplicaId,
        clock: u64,
        left: i64,
        right: i64,
    },

    #[error("Duplicate replica id in context: {0}")]
    DuplicateReplica(ReplicaId),
}

pub type Result<T> = std::result::Result<T, ContextError>;
