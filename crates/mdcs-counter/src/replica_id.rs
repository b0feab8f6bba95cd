//! Replica identifiers and the process-wide minter for local-pending ids.
//!
//! A [`ReplicaId`] is 16 opaque bytes plus a flag telling whether the id was
//! minted by this process for an increment that has not been globalized yet.
//! The flag never travels inside the id bytes: on the wire it lives in the
//! context header, so clearing it leaves the bytes untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use ulid::Ulid;

/// Width of a replica id on the wire.
pub const REPLICA_ID_LEN: usize = 16;

/// A globally unique, totally ordered shard identifier.
///
/// Ordering compares the id bytes first; the local flag only breaks ties
/// between two spellings of the same id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReplicaId {
    bytes: [u8; REPLICA_ID_LEN],
    local: bool,
}

impl ReplicaId {
    /// A stable (globalized) id with the given bytes.
    pub fn stable(bytes: [u8; REPLICA_ID_LEN]) -> Self {
        ReplicaId {
            bytes,
            local: false,
        }
    }

    /// A local-pending id with the given bytes.
    pub fn local(bytes: [u8; REPLICA_ID_LEN]) -> Self {
        ReplicaId { bytes, local: true }
    }

    /// Stable id whose low 8 bytes hold `n`. Used when replaying data from
    /// a known replica and by fixtures.
    pub fn from_u64(n: u64) -> Self {
        let mut bytes = [0u8; REPLICA_ID_LEN];
        bytes[8..].copy_from_slice(&n.to_be_bytes());
        ReplicaId::stable(bytes)
    }

    /// Read a stable id from the first [`REPLICA_ID_LEN`] bytes of `data`.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let bytes: [u8; REPLICA_ID_LEN] = data.get(..REPLICA_ID_LEN)?.try_into().ok()?;
        Some(ReplicaId::stable(bytes))
    }

    /// Mint a fresh local-pending id from the process-wide minter.
    pub fn mint_local() -> Self {
        ReplicaIdMinter::global().mint_local()
    }

    /// The raw id bytes, without the local flag.
    pub fn as_bytes(&self) -> &[u8; REPLICA_ID_LEN] {
        &self.bytes
    }

    /// True if minted locally and not yet globalized.
    pub fn is_local_pending(&self) -> bool {
        self.local
    }

    /// The same id with the local flag cleared.
    pub fn to_stable(self) -> Self {
        ReplicaId::stable(self.bytes)
    }

    /// The same id flagged as local-pending.
    pub fn to_local(self) -> Self {
        ReplicaId::local(self.bytes)
    }

    /// Whether two ids name the same shard, regardless of the local flag.
    pub fn same_shard(&self, other: &ReplicaId) -> bool {
        self.bytes == other.bytes
    }

    /// The id bytes read as a ULID.
    pub fn to_ulid(&self) -> Ulid {
        Ulid::from_bytes(self.bytes)
    }
}

impl From<Ulid> for ReplicaId {
    fn from(ulid: Ulid) -> Self {
        ReplicaId::stable(ulid.to_bytes())
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ulid())
    }
}

impl fmt::Debug for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.local {
            write!(f, "ReplicaId({}, local)", self.to_ulid())
        } else {
            write!(f, "ReplicaId({})", self.to_ulid())
        }
    }
}

/// Configuration for the replica id minter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinterConfig {
    /// Node identity written into the high 8 bytes of every minted id.
    /// `None` draws a random identity once per process.
    pub node_id: Option<u64>,
}

impl MinterConfig {
    /// Pin the node identity.
    pub fn with_node_id(mut self, node_id: u64) -> Self {
        self.node_id = Some(node_id);
        self
    }
}

static GLOBAL_MINTER: OnceLock<ReplicaIdMinter> = OnceLock::new();

/// Each microsecond of wall-clock time owns `2^SEQUENCE_SHIFT` sequence
/// numbers.
const SEQUENCE_SHIFT: u32 = 10;

/// Thread-safe source of local-pending replica ids.
///
/// Ids are `node_id (8 bytes BE) | sequence (8 bytes BE)`. The sequence
/// starts at the process start time in microseconds shifted left by
/// ten bits, and only moves forward. A restarted process on the
/// same node therefore continues past every id the previous incarnation
/// could have minted at up to 1024 ids per microsecond of its uptime.
#[derive(Debug)]
pub struct ReplicaIdMinter {
    node_id: u64,
    sequence: AtomicU64,
}

impl ReplicaIdMinter {
    /// A minter seeded from the current wall-clock time.
    pub fn new(config: &MinterConfig) -> Self {
        let node_id = config.node_id.unwrap_or_else(rand::random);
        let start = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self::starting_at(node_id, start)
    }

    fn starting_at(node_id: u64, start_micros: u64) -> Self {
        ReplicaIdMinter {
            node_id,
            sequence: AtomicU64::new(start_micros << SEQUENCE_SHIFT),
        }
    }

    /// The process-wide minter, created with a default config on first use.
    pub fn global() -> &'static ReplicaIdMinter {
        GLOBAL_MINTER.get_or_init(|| ReplicaIdMinter::new(&MinterConfig::default()))
    }

    /// Configure the process-wide minter. Returns `false` if it was already
    /// initialized, in which case `config` is ignored.
    pub fn install(config: MinterConfig) -> bool {
        let mut installed = false;
        GLOBAL_MINTER.get_or_init(|| {
            installed = true;
            ReplicaIdMinter::new(&config)
        });
        if installed {
            tracing::debug!(node_id = Self::global().node_id, "replica id minter installed");
            if config.node_id.is_some() {
                tracing::warn!(
                    node_id = Self::global().node_id,
                    "pinned node id: local ids stay unique across restarts only below 1024 mints per microsecond of uptime"
                );
            }
        }
        installed
    }

    /// The node identity in the high 8 bytes of every minted id.
    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    /// Mint a fresh local-pending id. Never returns the same id twice.
    pub fn mint_local(&self) -> ReplicaId {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut bytes = [0u8; REPLICA_ID_LEN];
        bytes[..8].copy_from_slice(&self.node_id.to_be_bytes());
        bytes[8..].copy_from_slice(&seq.to_be_bytes());
        ReplicaId::local(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_minted_ids_are_local_and_unique() {
        let minter = ReplicaIdMinter::new(&MinterConfig::default().with_node_id(7));
        let a = minter.mint_local();
        let b = minter.mint_local();

        assert!(a.is_local_pending());
        assert!(b.is_local_pending());
        assert_ne!(a, b);
        assert!(a < b);
        assert_eq!(&a.as_bytes()[..8], &7u64.to_be_bytes());
    }

    #[test]
    fn test_concurrent_minting_never_collides() {
        let minter = Arc::new(ReplicaIdMinter::new(&MinterConfig::default()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let minter = Arc::clone(&minter);
                thread::spawn(move || (0..500).map(|_| minter.mint_local()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {:?}", id);
            }
        }
        assert_eq!(seen.len(), 8 * 500);
    }

    #[test]
    fn test_restart_continues_past_previous_sequence() {
        let first = ReplicaIdMinter::starting_at(7, 1_000);
        let last_before_restart = (0..1024).map(|_| first.mint_local()).last().unwrap();

        // Restarted one microsecond later with the same pinned node id.
        let second = ReplicaIdMinter::starting_at(7, 1_001);
        let first_after_restart = second.mint_local();

        assert!(first_after_restart > last_before_restart);
        assert_eq!(&first_after_restart.as_bytes()[..8], &7u64.to_be_bytes());
    }

    #[test]
    fn test_current_time_fits_shifted_sequence() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_micros() as u64;
        assert!(now.leading_zeros() >= SEQUENCE_SHIFT + 1);
    }

    #[test]
    fn test_clearing_flag_keeps_bytes() {
        let id = ReplicaId::mint_local();
        let stable = id.to_stable();

        assert!(!stable.is_local_pending());
        assert_eq!(id.as_bytes(), stable.as_bytes());
        assert!(id.same_shard(&stable));
        assert_ne!(id, stable);
        assert_eq!(stable.to_local(), id);
    }

    #[test]
    fn test_ordering_is_bytewise() {
        let a = ReplicaId::from_u64(3);
        let b = ReplicaId::from_u64(6);
        let c = ReplicaId::from_u64(256);

        assert!(a < b);
        assert!(b < c);
        assert!(a.to_local() < b);
    }

    #[test]
    fn test_from_slice() {
        let id = ReplicaId::from_u64(42);
        assert_eq!(ReplicaId::from_slice(id.as_bytes()), Some(id));
        assert_eq!(ReplicaId::from_slice(&[0u8; 4]), None);
    }

    #[test]
    fn test_replica_id_serialization() {
        let id = ReplicaId::mint_local();
        let json = serde_json::to_string(&id).unwrap();
        let back: ReplicaId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn test_display_as_ulid() {
        let ulid = Ulid::new();
        let id = ReplicaId::from(ulid);
        assert_eq!(id.to_string(), ulid.to_string());
    }
}
