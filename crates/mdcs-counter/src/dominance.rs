//! Dominance between counter contexts, used by anti-entropy to decide
//! whether a value needs to be transferred at all.
//!
//! `a` dominates `b` when every replica in `b` also appears in `a` with an
//! equal or higher clock. The local flag plays no part.

use crate::context::CounterContext;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How one context's information relates to another's.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relationship {
    /// Same replicas at the same clocks.
    Equal,
    /// Strict superset of the other's information.
    GreaterThan,
    /// Strict subset of the other's information.
    LessThan,
    /// Each side knows something the other does not.
    Disjoint,
}

impl Relationship {
    fn absorb(self, step: Relationship) -> Relationship {
        match (self, step) {
            (current, Relationship::Equal) => current,
            (Relationship::Equal, step) => step,
            (current, step) if current == step => current,
            _ => Relationship::Disjoint,
        }
    }
}

impl CounterContext {
    /// Compare this context's information set with `other`'s.
    pub fn relationship(&self, other: &CounterContext) -> Relationship {
        let (l, r) = (self.shards(), other.shards());
        let mut rel = Relationship::Equal;
        let (mut i, mut j) = (0, 0);

        while i < l.len() && j < r.len() && rel != Relationship::Disjoint {
            let step = match l[i].id.as_bytes().cmp(r[j].id.as_bytes()) {
                Ordering::Less => {
                    i += 1;
                    Relationship::GreaterThan
                }
                Ordering::Greater => {
                    j += 1;
                    Relationship::LessThan
                }
                Ordering::Equal => {
                    let step = match l[i].clock.cmp(&r[j].clock) {
                        Ordering::Greater => Relationship::GreaterThan,
                        Ordering::Less => Relationship::LessThan,
                        Ordering::Equal => Relationship::Equal,
                    };
                    i += 1;
                    j += 1;
                    step
                }
            };
            rel = rel.absorb(step);
        }

        if i < l.len() {
            rel = rel.absorb(Relationship::GreaterThan);
        }
        if j < r.len() {
            rel = rel.absorb(Relationship::LessThan);
        }
        rel
    }

    /// True if this context already knows everything `other` knows.
    pub fn dominates(&self, other: &CounterContext) -> bool {
        matches!(
            self.relationship(other),
            Relationship::Equal | Relationship::GreaterThan
        )
    }

    /// `None` if this context dominates `other`, otherwise `other` itself,
    /// which the caller should adopt or fetch.
    pub fn diff(&self, other: &CounterContext) -> Option<CounterContext> {
        if self.dominates(other) {
            None
        } else {
            Some(other.clone())
        }
    }
}
