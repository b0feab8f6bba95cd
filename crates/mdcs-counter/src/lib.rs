//! # mdcs-counter
//!
//! Shard-based commutative counters for the MDCS (Merkle-Delta CRDT Store).
//!
//! A counter's value is a [`CounterContext`]: one [`ShardRecord`] per
//! replica that ever contributed, each carrying that replica's logical clock
//! and cumulative count. Two contexts produced on different nodes merge into
//! one deterministic result without coordination.
//!
//! This crate provides:
//! - Replica ids, including local-pending ids minted for increments that
//!   have not been globalized yet
//! - The canonical byte encoding of a context
//! - Merge (per-replica union, higher clock wins)
//! - Dominance / diff for anti-entropy
//!
//! ## Example
//!
//! ```rust
//! use mdcs_counter::{CounterContext, ReplicaId};
//!
//! let a = CounterContext::create_remote(ReplicaId::from_u64(1), 1, 1);
//! let b = CounterContext::create_remote(ReplicaId::from_u64(1), 2, 3);
//!
//! let merged = a.merge(&b).unwrap();
//! assert_eq!(merged.total(), 3);
//! assert!(merged.dominates(&a));
//! ```

mod builder;
mod context;
mod dominance;
mod error;
pub mod lattice;
mod merge;
mod replica_id;
mod shard;

pub use builder::ContextBuilder;
pub use context::{CounterContext, HEADER_ELT_LEN, HEADER_SIZE_LEN, MAX_LOCAL_INDEX};
pub use dominance::Relationship;
pub use error::{ContextError, Result};
pub use lattice::{reconcile_all, Reconcile};
pub use merge::merge;
pub use replica_id::{MinterConfig, ReplicaId, ReplicaIdMinter, REPLICA_ID_LEN};
pub use shard::{ShardRecord, SHARD_LEN};
