//! Merging two counter contexts.
//!
//! The result holds one shard per replica present on either side. When both
//! sides carry a shard for the same replica the higher clock wins outright;
//! counts are never summed across versions of one replica's shard.

use crate::builder::ContextBuilder;
use crate::context::CounterContext;
use crate::error::{ContextError, Result};
use crate::shard::ShardRecord;
use std::cmp::Ordering;

/// Merge `left` and `right` into a new context.
///
/// Commutative, associative and idempotent. Fails when both sides hold the
/// same replica at the same clock with different counts, or when a
/// local-pending shard would land past [`MAX_LOCAL_INDEX`](crate::MAX_LOCAL_INDEX).
pub fn merge(left: &CounterContext, right: &CounterContext) -> Result<CounterContext> {
    if right.is_empty() {
        return Ok(left.clone());
    }
    if left.is_empty() {
        return Ok(right.clone());
    }

    let (l, r) = (left.shards(), right.shards());
    let mut builder = ContextBuilder::with_capacity(l.len() + r.len());
    let (mut i, mut j) = (0, 0);
    while i < l.len() && j < r.len() {
        match l[i].id.as_bytes().cmp(r[j].id.as_bytes()) {
            Ordering::Less => {
                builder.push(l[i]);
                i += 1;
            }
            Ordering::Greater => {
                builder.push(r[j]);
                j += 1;
            }
            Ordering::Equal => {
                builder.push(resolve(&l[i], &r[j])?);
                i += 1;
                j += 1;
            }
        }
    }
    for shard in l[i..].iter().chain(&r[j..]) {
        builder.push(*shard);
    }

    tracing::trace!(left = l.len(), right = r.len(), merged = builder.len(), "merged counter contexts");
    builder.build_sorted()
}

/// Pick the surviving version of one replica's shard.
fn resolve(a: &ShardRecord, b: &ShardRecord) -> Result<ShardRecord> {
    match a.clock.cmp(&b.clock) {
        Ordering::Greater => Ok(*a),
        Ordering::Less => Ok(*b),
        Ordering::Equal if a.count != b.count => {
            tracing::warn!(
                replica = %a.id,
                clock = a.clock,
                left = a.count,
                right = b.count,
                "counter shards disagree at equal clock"
            );
            Err(ContextError::ClockCountMismatch {
                replica: a.id.to_stable(),
                clock: a.clock,
                left: a.count,
                right: b.count,
            })
        }
        // A globalized spelling beats a local-pending one.
        Ordering::Equal if a.is_local_pending() && b.is_local_pending() => Ok(*a),
        Ordering::Equal => Ok(a.to_stable()),
    }
}

impl CounterContext {
    /// See [`merge`].
    pub fn merge(&self, other: &CounterContext) -> Result<CounterContext> {
        merge(self, other)
    }
}
