//! Staging area for assembling a [`CounterContext`].

use crate::context::{check_local_positions, CounterContext};
use crate::error::{ContextError, Result};
use crate::replica_id::ReplicaId;
use crate::shard::ShardRecord;

/// Mutable builder that owns its scratch buffer until [`build`](Self::build)
/// turns it into an immutable context.
///
/// Shards may be pushed in any order; `build` sorts them by id and rejects
/// two shards for the same replica.
#[derive(Debug, Default)]
pub struct ContextBuilder {
    shards: Vec<ShardRecord>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with room for `capacity` shards.
    pub fn with_capacity(capacity: usize) -> Self {
        ContextBuilder {
            shards: Vec::with_capacity(capacity),
        }
    }

    /// Stage a shard whose id is local-pending.
    pub fn push_local(&mut self, id: ReplicaId, clock: u64, count: i64) -> &mut Self {
        self.push(ShardRecord::new(id.to_local(), clock, count))
    }

    /// Stage a shard whose id is stable.
    pub fn push_remote(&mut self, id: ReplicaId, clock: u64, count: i64) -> &mut Self {
        self.push(ShardRecord::new(id.to_stable(), clock, count))
    }

    /// Stage a shard as given, keeping its local flag.
    pub fn push(&mut self, shard: ShardRecord) -> &mut Self {
        self.shards.push(shard);
        self
    }

    /// Number of shards staged so far.
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Finalize into a canonical context.
    pub fn build(mut self) -> Result<CounterContext> {
        self.shards.sort_unstable_by(|a, b| a.id.as_bytes().cmp(b.id.as_bytes()));
        if let Some(pair) = self.shards.windows(2).find(|w| w[0].id.same_shard(&w[1].id)) {
            return Err(ContextError::DuplicateReplica(pair[0].id.to_stable()));
        }
        self.build_sorted()
    }

    /// Finalize shards the caller already emitted in strictly ascending id
    /// order, as the merge does.
    pub(crate) fn build_sorted(self) -> Result<CounterContext> {
        debug_assert!(self
            .shards
            .windows(2)
            .all(|w| w[0].id.as_bytes() < w[1].id.as_bytes()));
        check_local_positions(&self.shards)?;
        Ok(CounterContext::from_sorted(self.shards))
    }
}
