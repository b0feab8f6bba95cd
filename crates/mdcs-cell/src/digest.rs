//! Consistency digests for cells.
//!
//! Counter contexts are canonicalized with `clear_all_local` before hashing,
//! so a replica holding a local-pending shard and one holding the same shard
//! globalized produce the same digest.

use crate::cell::{Cell, CounterCell, Tombstone};
use crate::serializer::DELETION_MASK;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// A 32-byte SHA-256 digest of a cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Digest(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex of all 32 bytes.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Truncated display (first 8 chars).
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}...)", self.short())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Incremental hasher that cells feed themselves into.
pub struct CellHasher {
    inner: Sha256,
}

impl CellHasher {
    pub fn new() -> Self {
        CellHasher {
            inner: Sha256::new(),
        }
    }

    /// Feed more bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finish hashing.
    pub fn finalize(self) -> Digest {
        let result = self.inner.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&result);
        Digest(bytes)
    }
}

impl Default for CellHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything that can contribute to a consistency digest.
pub trait Digestible {
    fn update_digest(&self, hasher: &mut CellHasher);

    fn digest(&self) -> Digest {
        let mut hasher = CellHasher::new();
        self.update_digest(&mut hasher);
        hasher.finalize()
    }
}

/// The exact bytes a counter cell contributes to a digest:
/// `cleared context | write timestamp | last delete | name`.
pub fn digest_input(cell: &CounterCell) -> Vec<u8> {
    let context = cell.context().clear_all_local();
    let mut buf = Vec::with_capacity(context.encoded_len() + 16 + cell.name().len());
    context.write_to(&mut buf);
    buf.extend_from_slice(&cell.write_timestamp().to_be_bytes());
    buf.extend_from_slice(&cell.timestamp_of_last_delete().to_be_bytes());
    buf.extend_from_slice(cell.name().as_bytes());
    buf
}

impl Digestible for CounterCell {
    fn update_digest(&self, hasher: &mut CellHasher) {
        hasher.update(&digest_input(self));
    }
}

impl Digestible for Tombstone {
    fn update_digest(&self, hasher: &mut CellHasher) {
        hasher.update(&[DELETION_MASK]);
        hasher.update(&self.marked_for_delete_at().to_be_bytes());
        hasher.update(&self.local_deletion_time().to_be_bytes());
        hasher.update(self.name().as_bytes());
    }
}

impl Digestible for Cell {
    fn update_digest(&self, hasher: &mut CellHasher) {
        match self {
            Cell::Counter(c) => c.update_digest(hasher),
            Cell::Tombstone(t) => t.update_digest(hasher),
        }
    }
}
