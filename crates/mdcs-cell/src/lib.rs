//! # mdcs-cell
//!
//! Counter cells for the MDCS (Merkle-Delta CRDT Store).
//!
//! A [`CounterCell`] ties a [`CounterContext`](mdcs_counter::CounterContext)
//! to its write timestamp and the timestamp of the last delete it has seen.
//! A [`Tombstone`] competes with it for the same slot.
//!
//! This crate provides:
//! - Cell-level reconcile, including counter/tombstone interaction
//! - Cell-level diff for anti-entropy
//! - Digests that ignore local-pending shard markers
//! - The wire encoding, with a [`DecodeMode::FromRemote`] mode that clears
//!   another process's local-pending markers on read
//!
//! ## Example
//!
//! ```rust
//! use mdcs_cell::{Cell, CellSerializer, CounterCell, DecodeMode, Digestible, Tombstone, NO_DELETION};
//!
//! let live: Cell = CounterCell::create_local("hits", 3, 10, NO_DELETION).into();
//! let dead: Cell = Tombstone::new("hits", 0, 5).into();
//!
//! // The delete predates the write, so the counter survives and records it.
//! let merged = live.reconcile(&dead).unwrap();
//! assert_eq!(merged.as_counter().unwrap().timestamp_of_last_delete(), 5);
//!
//! // A replica receiving the value sees only stable shards, same digest.
//! let bytes = CellSerializer::encode(&merged).unwrap();
//! let received = CellSerializer::decode(&bytes, DecodeMode::FromRemote).unwrap();
//! assert_eq!(received.digest(), merged.digest());
//! ```

mod cell;
mod digest;
mod error;
mod reconcile;
mod serializer;

pub use cell::{Cell, CellName, CounterCell, Tombstone, NO_DELETION};
pub use digest::{digest_input, CellHasher, Digest, Digestible};
pub use error::{CellError, Result};
pub use serializer::{CellSerializer, DecodeMode, COUNTER_MASK, DELETION_MASK, MAX_NAME_LEN};
