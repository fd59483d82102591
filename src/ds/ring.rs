//! Consistent-hash ring with virtual nodes.
//!
//! Maps cache keys to owning peers so that every node in a fleet, given the
//! same membership, resolves the same owner for the same key. Each peer is
//! planted on the ring `replicas` times ("virtual nodes") to smooth key
//! distribution when the fleet is small.
//!
//! ## Architecture
//!
//! ```text
//!        0 ──────────────► u32::MAX, wrapping
//!        │
//!   ┌────┴─────────────────────────────────────────────┐
//!   │  points: sorted Vec<u32>   owners: point → peer  │
//!   │                                                  │
//!   │   ·───p1-0───p2-1───p1-1───p3-0───p2-0───·       │
//!   │                ▲                                 │
//!   │        H(key) ─┘  first point ≥ H(key) owns key  │
//!   └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Contract
//!
//! Virtual-node points are `H(base10(i) ++ peer)` for `i ∈ [0, replicas)` —
//! the replica index is a *prefix*, rendered in decimal. Every node in the
//! fleet must compute ownership identically or requests get forwarded to the
//! wrong peer, so neither the prefix scheme nor the default CRC32-IEEE hash
//! can change without a fleet-wide flag day.
//!
//! ## Example Usage
//!
//! ```
//! use peercache::ds::ring::HashRing;
//!
//! let mut ring = HashRing::new(50);
//! ring.add(["peer-a", "peer-b", "peer-c"]);
//!
//! // Deterministic: the same key always lands on the same peer.
//! let owner = ring.get("Tom").unwrap().to_owned();
//! assert_eq!(ring.get("Tom"), Some(owner.as_str()));
//!
//! // An empty ring has no owner for anything.
//! let empty = HashRing::new(50);
//! assert_eq!(empty.get("Tom"), None);
//! ```

use rustc_hash::FxHashMap;

/// Hash function used to place peers and keys on the ring.
pub type RingHasher = Box<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// Consistent-hash ring mapping keys to peer names.
///
/// Lookups are read-only and O(log points); membership changes re-sort the
/// full point list. Callers that mutate membership at runtime must guard the
/// ring themselves (see [`HttpPool`](crate::http::HttpPool), which keeps it
/// behind the pool mutex).
pub struct HashRing {
    replicas: usize,
    hash: RingHasher,
    points: Vec<u32>,
    owners: FxHashMap<u32, String>,
}

impl HashRing {
    /// Creates a ring placing each peer `replicas` times, hashing with
    /// CRC32-IEEE.
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, |data| crc32fast::hash(data))
    }

    /// Creates a ring with a custom hash, letting tests pin the layout.
    pub fn with_hasher<H>(replicas: usize, hash: H) -> Self
    where
        H: Fn(&[u8]) -> u32 + Send + Sync + 'static,
    {
        Self {
            replicas,
            hash: Box::new(hash),
            points: Vec::new(),
            owners: FxHashMap::default(),
        }
    }

    /// Adds peers to the ring.
    ///
    /// Each peer contributes `replicas` points; the point list is re-sorted
    /// once per batch. Colliding points resolve to whichever peer was added
    /// last, deterministically for a given insertion order.
    pub fn add<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for peer in peers {
            let peer = peer.as_ref();
            for i in 0..self.replicas {
                let point = (self.hash)(format!("{i}{peer}").as_bytes());
                self.points.push(point);
                self.owners.insert(point, peer.to_owned());
            }
        }
        self.points.sort_unstable();
    }

    /// Resolves the peer owning `key`, or `None` on an empty ring.
    ///
    /// The owner is the peer at the smallest point ≥ `H(key)`, wrapping to
    /// the first point past the top of the hash space.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.points.is_empty() {
            return None;
        }

        let target = (self.hash)(key.as_bytes());
        let idx = self.points.partition_point(|&point| point < target);
        let point = self.points[idx % self.points.len()];
        self.owners.get(&point).map(String::as_str)
    }

    /// Number of points on the ring (peers × replicas, modulo collisions).
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if no peers have been added.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl std::fmt::Debug for HashRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("points", &self.points.len())
            .finish_non_exhaustive()
    }
}
