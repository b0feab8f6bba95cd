//! Cell-level reconciliation and diff.
//!
//! Precedence, for two versions of the same cell:
//! 1. tombstone vs tombstone: the later delete wins; on a tie the right-hand
//!    operand wins unless the left one has the later local deletion time
//! 2. tombstone `t` vs counter `c`:
//!    - `t > c.write_timestamp`: the tombstone shadows the counter
//!    - `t <= c.timestamp_of_last_delete`: the counter already knows of it
//!    - otherwise the counter survives with its last delete raised to `t`
//! 3. counter vs counter: contexts merge, both timestamps take the max

use crate::cell::{Cell, CounterCell, Tombstone};
use crate::error::{CellError, Result};
use mdcs_counter::Reconcile;

fn check_names(left: &Cell, right: &Cell) -> Result<()> {
    if left.name() != right.name() {
        return Err(CellError::NameMismatch {
            left: left.name().clone(),
            right: right.name().clone(),
        });
    }
    Ok(())
}

impl CounterCell {
    /// Merge two live versions of this counter.
    pub fn reconcile(&self, other: &CounterCell) -> Result<CounterCell> {
        if self.name() != other.name() {
            return Err(CellError::NameMismatch {
                left: self.name().clone(),
                right: other.name().clone(),
            });
        }
        let context = self.context().merge(other.context())?;
        Ok(CounterCell::new(
            self.name().clone(),
            context,
            self.write_timestamp().max(other.write_timestamp()),
        )
        .with_timestamp_of_last_delete(
            self.timestamp_of_last_delete()
                .max(other.timestamp_of_last_delete()),
        ))
    }

    /// `None` if this version already has everything `other` has.
    ///
    /// Write timestamp is checked first, then the last delete, then the
    /// contexts themselves.
    pub fn diff(&self, other: &CounterCell) -> Option<CounterCell> {
        if self.write_timestamp() < other.write_timestamp()
            || self.timestamp_of_last_delete() < other.timestamp_of_last_delete()
            || !self.context().dominates(other.context())
        {
            Some(other.clone())
        } else {
            None
        }
    }

    /// Fold a delete into this counter.
    pub fn apply_tombstone(&self, tombstone: &Tombstone) -> Cell {
        let deleted_at = tombstone.marked_for_delete_at();
        if deleted_at > self.write_timestamp() {
            tracing::debug!(cell = %self.name(), deleted_at, "tombstone shadows counter");
            Cell::Tombstone(tombstone.clone())
        } else if deleted_at <= self.timestamp_of_last_delete() {
            Cell::Counter(self.clone())
        } else {
            Cell::Counter(self.clone().with_timestamp_of_last_delete(deleted_at))
        }
    }
}

impl Tombstone {
    fn supersedes(&self, other: &Tombstone) -> bool {
        (self.marked_for_delete_at(), self.local_deletion_time())
            > (other.marked_for_delete_at(), other.local_deletion_time())
    }
}

impl Cell {
    /// Deterministic merge of two versions of this cell.
    pub fn reconcile(&self, other: &Cell) -> Result<Cell> {
        check_names(self, other)?;
        match (self, other) {
            (Cell::Tombstone(left), Cell::Tombstone(right)) => {
                if left.supersedes(right) {
                    Ok(self.clone())
                } else {
                    Ok(other.clone())
                }
            }
            (Cell::Tombstone(tombstone), Cell::Counter(counter))
            | (Cell::Counter(counter), Cell::Tombstone(tombstone)) => {
                Ok(counter.apply_tombstone(tombstone))
            }
            (Cell::Counter(left), Cell::Counter(right)) => Ok(Cell::Counter(left.reconcile(right)?)),
        }
    }

    /// `Ok(None)` if this version already has everything `other` has,
    /// otherwise `Ok(Some(other))`.
    pub fn diff(&self, other: &Cell) -> Result<Option<Cell>> {
        check_names(self, other)?;
        match (self, other) {
            (Cell::Counter(left), Cell::Counter(right)) => Ok(left.diff(right).map(Cell::Counter)),
            _ => {
                let reconciled = self.reconcile(other)?;
                if &reconciled == self {
                    Ok(None)
                } else {
                    Ok(Some(other.clone()))
                }
            }
        }
    }

    /// Whether this version already carries everything `other` does.
    /// Fails with `NameMismatch` for versions of different cells.
    pub fn dominates(&self, other: &Cell) -> Result<bool> {
        Ok(self.diff(other)?.is_none())
    }
}

impl Reconcile for Cell {
    type Error = CellError;

    fn reconcile(&self, other: &Self) -> Result<Self> {
        Cell::reconcile(self, other)
    }

    fn dominates(&self, other: &Self) -> Result<bool> {
        Cell::dominates(self, other)
    }

    fn diff(&self, other: &Self) -> Result<Option<Self>> {
        Cell::diff(self, other)
    }
}
