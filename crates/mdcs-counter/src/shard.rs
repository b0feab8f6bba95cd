//! A single replica's contribution to a counter.

use crate::replica_id::{ReplicaId, REPLICA_ID_LEN};
use serde::{Deserialize, Serialize};

/// Encoded width of one shard: `id | clock (u64 BE) | count (i64 BE)`.
pub const SHARD_LEN: usize = REPLICA_ID_LEN + 8 + 8;

/// One `(replica, logical clock, count)` triple.
///
/// `count` is the cumulative delta contributed by `id` as of `clock`; a
/// record with a higher clock for the same id supersedes, it never adds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardRecord {
    pub id: ReplicaId,
    pub clock: u64,
    pub count: i64,
}

impl ShardRecord {
    /// A shard for `id` at `clock` holding `count`.
    pub fn new(id: ReplicaId, clock: u64, count: i64) -> Self {
        ShardRecord { id, clock, count }
    }

    /// True if the shard's id is local-pending.
    pub fn is_local_pending(&self) -> bool {
        self.id.is_local_pending()
    }

    /// The same record with its id's local flag cleared.
    pub fn to_stable(self) -> Self {
        ShardRecord {
            id: self.id.to_stable(),
            ..self
        }
    }

    /// Append the fixed-width encoding. The local flag is not part of it.
    pub(crate) fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.id.as_bytes());
        buf.extend_from_slice(&self.clock.to_be_bytes());
        buf.extend_from_slice(&self.count.to_be_bytes());
    }

    /// Decode one record from exactly [`SHARD_LEN`] bytes.
    pub(crate) fn read_from(chunk: &[u8; SHARD_LEN], local: bool) -> Self {
        let mut id_bytes = [0u8; REPLICA_ID_LEN];
        id_bytes.copy_from_slice(&chunk[..REPLICA_ID_LEN]);
        let mut clock = [0u8; 8];
        clock.copy_from_slice(&chunk[REPLICA_ID_LEN..REPLICA_ID_LEN + 8]);
        let mut count = [0u8; 8];
        count.copy_from_slice(&chunk[REPLICA_ID_LEN + 8..]);

        let id = if local {
            ReplicaId::local(id_bytes)
        } else {
            ReplicaId::stable(id_bytes)
        };
        ShardRecord {
            id,
            clock: u64::from_be_bytes(clock),
            count: i64::from_be_bytes(count),
        }
    }
}
