//! Counter cells and delete markers sharing a name-keyed slot.

use mdcs_counter::{CounterContext, ReplicaIdMinter};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel for "never shadowed by a delete".
pub const NO_DELETION: i64 = i64::MIN;

/// The key of a cell within its row.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellName(Vec<u8>);

impl CellName {
    /// A name from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        CellName(bytes.into())
    }

    /// The raw name bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for CellName {
    fn from(name: &str) -> Self {
        CellName(name.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for CellName {
    fn from(bytes: Vec<u8>) -> Self {
        CellName(bytes)
    }
}

impl fmt::Display for CellName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for CellName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellName({:?})", String::from_utf8_lossy(&self.0))
    }
}

/// A live counter value with its write-time and delete-time metadata.
///
/// Immutable: reconciliation always produces a new cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterCell {
    name: CellName,
    context: CounterContext,
    write_timestamp: i64,
    timestamp_of_last_delete: i64,
}

impl CounterCell {
    /// A live cell that has never seen a delete.
    pub fn new(name: impl Into<CellName>, context: CounterContext, write_timestamp: i64) -> Self {
        CounterCell {
            name: name.into(),
            context,
            write_timestamp,
            timestamp_of_last_delete: NO_DELETION,
        }
    }

    /// A cell holding a single fresh local-pending shard of `delta`.
    pub fn create_local(
        name: impl Into<CellName>,
        delta: i64,
        write_timestamp: i64,
        timestamp_of_last_delete: i64,
    ) -> Self {
        Self::create_local_with(
            ReplicaIdMinter::global(),
            name,
            delta,
            write_timestamp,
            timestamp_of_last_delete,
        )
    }

    /// Like [`create_local`](Self::create_local), minting from `minter`.
    pub fn create_local_with(
        minter: &ReplicaIdMinter,
        name: impl Into<CellName>,
        delta: i64,
        write_timestamp: i64,
        timestamp_of_last_delete: i64,
    ) -> Self {
        CounterCell::new(
            name,
            CounterContext::create_local_with(minter, delta),
            write_timestamp,
        )
        .with_timestamp_of_last_delete(timestamp_of_last_delete)
    }

    /// Replace the last-delete timestamp.
    pub fn with_timestamp_of_last_delete(mut self, timestamp_of_last_delete: i64) -> Self {
        self.timestamp_of_last_delete = timestamp_of_last_delete;
        self
    }

    /// The cell this version belongs to.
    pub fn name(&self) -> &CellName {
        &self.name
    }

    /// The shard collection holding the value.
    pub fn context(&self) -> &CounterContext {
        &self.context
    }

    /// Timestamp of the latest write folded in.
    pub fn write_timestamp(&self) -> i64 {
        self.write_timestamp
    }

    /// Latest delete this cell survived, or [`NO_DELETION`].
    pub fn timestamp_of_last_delete(&self) -> i64 {
        self.timestamp_of_last_delete
    }

    /// The counter's value.
    pub fn total(&self) -> i64 {
        self.context.total()
    }

    /// Whether a delete has ever been folded into this cell.
    pub fn has_seen_delete(&self) -> bool {
        self.timestamp_of_last_delete != NO_DELETION
    }

    /// The same cell with every local-pending shard marked stable.
    pub fn clear_all_local(&self) -> Self {
        CounterCell {
            context: self.context.clear_all_local(),
            ..self.clone()
        }
    }
}

/// A delete marker for a cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tombstone {
    name: CellName,
    /// Server-local time of the delete, in seconds.
    local_deletion_time: i32,
    marked_for_delete_at: i64,
}

impl Tombstone {
    /// A delete of `name` issued at `marked_for_delete_at`.
    pub fn new(name: impl Into<CellName>, local_deletion_time: i32, marked_for_delete_at: i64) -> Self {
        Tombstone {
            name: name.into(),
            local_deletion_time,
            marked_for_delete_at,
        }
    }

    /// The cell this version belongs to.
    pub fn name(&self) -> &CellName {
        &self.name
    }

    /// Server-local time of the delete, in seconds.
    pub fn local_deletion_time(&self) -> i32 {
        self.local_deletion_time
    }

    /// Client timestamp of the delete.
    pub fn marked_for_delete_at(&self) -> i64 {
        self.marked_for_delete_at
    }
}

/// Either variant that can occupy a counter cell's slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    Counter(CounterCell),
    Tombstone(Tombstone),
}

impl Cell {
    /// The cell this version belongs to.
    pub fn name(&self) -> &CellName {
        match self {
            Cell::Counter(c) => c.name(),
            Cell::Tombstone(t) => t.name(),
        }
    }

    /// Write timestamp for counters, delete timestamp for tombstones.
    pub fn timestamp(&self) -> i64 {
        match self {
            Cell::Counter(c) => c.write_timestamp(),
            Cell::Tombstone(t) => t.marked_for_delete_at(),
        }
    }

    /// True for a counter, false for a tombstone.
    pub fn is_live(&self) -> bool {
        matches!(self, Cell::Counter(_))
    }

    /// The counter, if this is one.
    pub fn as_counter(&self) -> Option<&CounterCell> {
        match self {
            Cell::Counter(c) => Some(c),
            Cell::Tombstone(_) => None,
        }
    }

    /// The tombstone, if this is one.
    pub fn as_tombstone(&self) -> Option<&Tombstone> {
        match self {
            Cell::Counter(_) => None,
            Cell::Tombstone(t) => Some(t),
        }
    }
}

impl From<CounterCell> for Cell {
    fn from(cell: CounterCell) -> Self {
        Cell::Counter(cell)
    }
}

impl From<Tombstone> for Cell {
    fn from(tombstone: Tombstone) -> Self {
        Cell::Tombstone(tombstone)
    }
}
