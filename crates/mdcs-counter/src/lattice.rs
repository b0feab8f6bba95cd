//! The reconcile contract shared by counter contexts and cells.
//!
//! A reconcile operation must satisfy the join-semilattice laws:
//!  - Commutativity: a ⊔ b = b ⊔ a
//!  - Associativity: (a ⊔ b) ⊔ c = a ⊔ (b ⊔ c)
//!  - Idempotence:  a ⊔ a = a
//!
//! Unlike a plain lattice join it may fail, since two stored versions can be
//! corrupt in a way no merge rule should paper over.

use crate::context::CounterContext;
use crate::error::ContextError;
use std::cmp::Ordering;

pub trait Reconcile: Clone + PartialEq {
    type Error;

    /// Deterministic merge of two versions of the same value.
    fn reconcile(&self, other: &Self) -> Result<Self, Self::Error>;

    /// True if `self` already carries everything `other` does. Fails on
    /// the same preconditions as `reconcile`.
    fn dominates(&self, other: &Self) -> Result<bool, Self::Error>;

    /// `None` if nothing needs transferring from `other`, otherwise `other`.
    fn diff(&self, other: &Self) -> Result<Option<Self>, Self::Error> {
        if self.dominates(other)? {
            Ok(None)
        } else {
            Ok(Some(other.clone()))
        }
    }

    /// Partial order derived from dominance.
    fn partial_cmp_reconcile(&self, other: &Self) -> Result<Option<Ordering>, Self::Error> {
        Ok(match (self.dominates(other)?, other.dominates(self)?) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Greater),
            (false, true) => Some(Ordering::Less),
            (false, false) => None,
        })
    }
}

impl Reconcile for CounterContext {
    type Error = ContextError;

    fn reconcile(&self, other: &Self) -> Result<Self, ContextError> {
        crate::merge::merge(self, other)
    }

    fn dominates(&self, other: &Self) -> Result<bool, ContextError> {
        Ok(CounterContext::dominates(self, other))
    }
}

/// Reconcile every value in `values`, in order. `None` for an empty input.
pub fn reconcile_all<'a, T, I>(values: I) -> Option<Result<T, T::Error>>
where
    T: Reconcile + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut iter = values.into_iter();
    let first = iter.next()?.clone();
    Some(iter.try_fold(first, |acc, next| acc.reconcile(next)))
}
