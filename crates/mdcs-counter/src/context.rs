//! Counter contexts: the immutable, canonically ordered shard collection
//! that is a counter's stored value.
//!
//! ## Encoding
//!
//! ```text
//! header: n (i16 BE) | n local shard indices (i16 BE, ascending)
//! body:   shard* where shard = id (16) | clock (u64 BE) | count (i64 BE)
//! ```
//!
//! Shards appear in ascending id order. A context without local-pending
//! shards has the two-byte header `00 00`.

use crate::builder::ContextBuilder;
use crate::error::{ContextError, Result};
use crate::replica_id::{ReplicaId, ReplicaIdMinter};
use crate::shard::{ShardRecord, SHARD_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Width of the header's element count.
pub const HEADER_SIZE_LEN: usize = 2;
/// Width of one header element (a local shard index).
pub const HEADER_ELT_LEN: usize = 2;
/// Highest position a local-pending shard may occupy, and the most
/// local-pending shards one context may hold. Both are written as `i16`.
/// Stable shards are not limited.
pub const MAX_LOCAL_INDEX: usize = i16::MAX as usize;

/// Reject shard lists whose local-pending positions or count cannot be
/// written into the `i16` header.
pub(crate) fn check_local_positions(shards: &[ShardRecord]) -> Result<()> {
    let mut local_count = 0usize;
    for (idx, _) in shards.iter().enumerate().filter(|(_, s)| s.is_local_pending()) {
        if idx > MAX_LOCAL_INDEX {
            return Err(malformed(format!(
                "local shard at index {} exceeds header limit {}",
                idx, MAX_LOCAL_INDEX
            )));
        }
        local_count += 1;
    }
    if local_count > MAX_LOCAL_INDEX {
        return Err(malformed(format!(
            "{} local shards exceeds header limit {}",
            local_count, MAX_LOCAL_INDEX
        )));
    }
    Ok(())
}

/// The value of a counter: one shard per contributing replica.
///
/// Cloning is cheap; the shard list is shared and never mutated.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<ShardRecord>", into = "Vec<ShardRecord>")]
pub struct CounterContext {
    shards: Arc<[ShardRecord]>,
    local_count: usize,
}

impl CounterContext {
    /// The context of a counter nobody has written.
    pub fn empty() -> Self {
        CounterContext {
            shards: Arc::from(Vec::new()),
            local_count: 0,
        }
    }

    /// Single local-pending shard for a fresh increment: clock 1, count `delta`.
    pub fn create_local(delta: i64) -> Self {
        Self::create_local_with(ReplicaIdMinter::global(), delta)
    }

    /// Like [`create_local`](Self::create_local), minting from `minter`.
    pub fn create_local_with(minter: &ReplicaIdMinter, delta: i64) -> Self {
        Self::from_sorted(vec![ShardRecord::new(minter.mint_local(), 1, delta)])
    }

    /// Single shard with an explicitly supplied id, always stored stable.
    pub fn create_remote(id: ReplicaId, clock: u64, count: i64) -> Self {
        Self::from_sorted(vec![ShardRecord::new(id.to_stable(), clock, count)])
    }

    /// Build from `(id, clock, count, is_local)` entries in any order.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (ReplicaId, u64, i64, bool)>,
    {
        let entries = entries.into_iter();
        let mut builder = ContextBuilder::with_capacity(entries.size_hint().0);
        for (id, clock, count, local) in entries {
            if local {
                builder.push_local(id, clock, count);
            } else {
                builder.push_remote(id, clock, count);
            }
        }
        builder.build()
    }

    /// Wrap shards that are already strictly ascending by id.
    pub(crate) fn from_sorted(shards: Vec<ShardRecord>) -> Self {
        let local_count = shards.iter().filter(|s| s.is_local_pending()).count();
        CounterContext {
            shards: Arc::from(shards),
            local_count,
        }
    }

    /// Sum of every shard's count.
    pub fn total(&self) -> i64 {
        self.shards
            .iter()
            .fold(0i64, |acc, shard| acc.wrapping_add(shard.count))
    }

    /// Shards in ascending id order.
    pub fn shards(&self) -> &[ShardRecord] {
        &self.shards
    }

    /// Number of shards.
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// True for a counter nobody has written.
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Number of local-pending shards.
    pub fn local_count(&self) -> usize {
        self.local_count
    }

    /// True if any shard is local-pending.
    pub fn has_local_shards(&self) -> bool {
        self.local_count > 0
    }

    /// Look up the shard for `id`, ignoring the local flag.
    pub fn get(&self, id: &ReplicaId) -> Option<&ShardRecord> {
        self.shards
            .binary_search_by(|s| s.id.as_bytes().cmp(id.as_bytes()))
            .ok()
            .map(|idx| &self.shards[idx])
    }

    /// Clock of `id`'s shard, if present.
    pub fn clock_of(&self, id: &ReplicaId) -> Option<u64> {
        self.get(id).map(|s| s.clock)
    }

    /// A copy with every local-pending id rewritten as stable. Ids, clocks
    /// and counts are otherwise unchanged.
    pub fn clear_all_local(&self) -> Self {
        if !self.has_local_shards() {
            return self.clone();
        }
        Self::from_sorted(self.shards.iter().map(|s| s.to_stable()).collect())
    }

    /// Size of [`to_bytes`](Self::to_bytes) output.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE_LEN + self.local_count * HEADER_ELT_LEN + self.shards.len() * SHARD_LEN
    }

    /// Encode header and shards. Every constructor checks local positions
    /// against [`MAX_LOCAL_INDEX`], so header entries never truncate.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf
    }

    /// Append the encoding to `buf`.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.local_count as i16).to_be_bytes());
        for (idx, _) in self
            .shards
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_local_pending())
        {
            buf.extend_from_slice(&(idx as i16).to_be_bytes());
        }
        for shard in self.shards.iter() {
            shard.write_to(buf);
        }
    }

    /// Decode a context, rejecting anything truncated or inconsistent.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE_LEN {
            return Err(malformed(format!(
                "{} bytes is shorter than the header",
                data.len()
            )));
        }
        let header_count = i16::from_be_bytes([data[0], data[1]]);
        if header_count < 0 {
            return Err(malformed(format!("negative header count {}", header_count)));
        }
        let header_count = header_count as usize;
        let header_len = HEADER_SIZE_LEN + header_count * HEADER_ELT_LEN;
        if data.len() < header_len {
            return Err(malformed(format!(
                "header needs {} bytes, buffer has {}",
                header_len,
                data.len()
            )));
        }

        let body = &data[header_len..];
        if body.len() % SHARD_LEN != 0 {
            return Err(malformed(format!(
                "body length {} is not a multiple of {}",
                body.len(),
                SHARD_LEN
            )));
        }
        let shard_count = body.len() / SHARD_LEN;
        if header_count > shard_count {
            return Err(malformed(format!(
                "{} local shards declared for {} shards",
                header_count, shard_count
            )));
        }

        let mut locals = Vec::with_capacity(header_count);
        for elt in data[HEADER_SIZE_LEN..header_len].chunks_exact(HEADER_ELT_LEN) {
            let idx = i16::from_be_bytes([elt[0], elt[1]]);
            if idx < 0 || idx as usize >= shard_count {
                return Err(malformed(format!("local shard index {} out of range", idx)));
            }
            if locals.last().is_some_and(|&prev| prev >= idx as usize) {
                return Err(malformed("local shard indices not ascending".to_string()));
            }
            locals.push(idx as usize);
        }

        let mut shards: Vec<ShardRecord> = Vec::with_capacity(shard_count);
        let mut next_local = locals.iter().peekable();
        for (idx, chunk) in body.chunks_exact(SHARD_LEN).enumerate() {
            let local = next_local.next_if(|&&l| l == idx).is_some();
            let chunk: &[u8; SHARD_LEN] = chunk
                .try_into()
                .map_err(|_| malformed("short shard".to_string()))?;
            let shard = ShardRecord::read_from(chunk, local);
            if let Some(prev) = shards.last() {
                if prev.id.as_bytes() >= shard.id.as_bytes() {
                    return Err(malformed(format!(
                        "shard ids not strictly ascending at index {}",
                        idx
                    )));
                }
            }
            shards.push(shard);
        }

        check_local_positions(&shards)?;
        Ok(Self::from_sorted(shards))
    }
}

fn malformed(reason: String) -> ContextError {
    ContextError::MalformedContext(reason)
}

impl Default for CounterContext {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for CounterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterContext")
            .field("total", &self.total())
            .field("shards", &&*self.shards)
            .finish()
    }
}

impl TryFrom<Vec<ShardRecord>> for CounterContext {
    type Error = ContextError;

    fn try_from(shards: Vec<ShardRecord>) -> Result<Self> {
        let mut builder = ContextBuilder::with_capacity(shards.len());
        for shard in shards {
            builder.push(shard);
        }
        builder.build()
    }
}

impl From<CounterContext> for Vec<ShardRecord> {
    fn from(ctx: CounterContext) -> Self {
        ctx.shards.to_vec()
    }
}
