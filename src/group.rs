//! Group coordinator: the end-to-end read-through pipeline.
//!
//! A [`Group`] is a named cache namespace that composes the byte-bounded
//! LRU store, the single-flight arena, an optional peer picker, and a
//! user-supplied [`Loader`] into one `get` path:
//!
//! ```text
//!   get(key)
//!     │
//!     ├── "" ──────────────────────────────► Err(EmptyKey)
//!     │
//!     ├── local store hit ─────────────────► value            (1)
//!     │
//!     └── miss → single-flight(key):
//!            ├── picker says remote owner
//!            │      ├── peer get ok ───────► value, NOT cached locally (2)
//!            │      └── peer get failed ──┐
//!            └── picker says self / none ─┴► loader → populate → value (3)
//! ```
//!
//! Remote hits (2) are deliberately not populated: the owning peer is the
//! single authority for that key, and caching it here too would multiply
//! the fleet's storage footprint and defeat the routing. Only locally
//! loaded values (3) enter the local store.
//!
//! Groups live in a process-wide registry with init-once-per-name
//! semantics: [`new_group`] registers, [`get_group`] looks up (the HTTP
//! server resolves incoming group names through it).
//!
//! ## Example Usage
//!
//! ```
//! use peercache::group::new_group;
//! use peercache::error::BoxError;
//!
//! let group = new_group("example-scores", 2 << 10, |key: &str| -> Result<Vec<u8>, BoxError> {
//!     match key {
//!         "Tom" => Ok(b"630".to_vec()),
//!         _ => Err(format!("{key} not exist").into()),
//!     }
//! });
//!
//! let view = group.get("Tom").unwrap();
//! assert_eq!(view.as_bytes(), b"630");
//!
//! // Second lookup is served from the local store.
//! assert_eq!(group.stats().hits, 0);
//! group.get("Tom").unwrap();
//! assert_eq!(group.stats().hits, 1);
//! ```

use std::sync::{Arc, LazyLock, OnceLock};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::byte_view::ByteView;
use crate::ds::flight::FlightGroup;
use crate::error::{BoxError, GetError};
use crate::peers::PeerPicker;
use crate::store::lru::{ConcurrentLruStore, StoreMetrics};

/// Maps a key to bytes from the authoritative data source.
///
/// Called at most once per concurrent miss on a group/key (single-flight
/// collapses the rest). Returning an error leaves the cache unpopulated.
///
/// Any `Fn(&str) -> Result<Vec<u8>, BoxError>` is a loader, so both bare
/// functions and capturing closures work without a wrapper type.
pub trait Loader: Send + Sync {
    /// Loads the value for `key` from the source of truth.
    fn load(&self, key: &str) -> Result<Vec<u8>, BoxError>;
}

impl<F> Loader for F
where
    F: Fn(&str) -> Result<Vec<u8>, BoxError> + Send + Sync,
{
    fn load(&self, key: &str) -> Result<Vec<u8>, BoxError> {
        self(key)
    }
}

/// A named cache namespace with its own store, loader, and (optionally)
/// peer routing. Groups do not share storage.
pub struct Group {
    name: String,
    loader: Box<dyn Loader>,
    main_cache: ConcurrentLruStore<ByteView>,
    flights: FlightGroup<Result<ByteView, GetError>>,
    peers: OnceLock<Box<dyn PeerPicker>>,
}

static GROUPS: LazyLock<RwLock<FxHashMap<String, Arc<Group>>>> =
    LazyLock::new(|| RwLock::new(FxHashMap::default()));

/// Creates a group and installs it in the process-wide registry.
///
/// `cache_bytes` bounds the group's local store (`0` = unbounded).
///
/// # Panics
///
/// Panics if a group named `name` already exists — names are
/// init-once-per-process.
pub fn new_group(name: &str, cache_bytes: usize, loader: impl Loader + 'static) -> Arc<Group> {
    let group = Arc::new(Group {
        name: name.to_owned(),
        loader: Box::new(loader),
        main_cache: ConcurrentLruStore::new(cache_bytes),
        flights: FlightGroup::new(),
        peers: OnceLock::new(),
    });

    let mut groups = GROUPS.write();
    if groups.contains_key(name) {
        panic!("group {name:?} is already registered");
    }
    groups.insert(name.to_owned(), Arc::clone(&group));
    group
}

/// Looks up a previously created group.
pub fn get_group(name: &str) -> Option<Arc<Group>> {
    GROUPS.read().get(name).cloned()
}

impl Group {
    /// The group's registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers the peer picker that routes misses across the fleet.
    ///
    /// # Panics
    ///
    /// Panics when called a second time: rewiring a live group's routing is
    /// a programming error.
    pub fn register_peer_picker(&self, picker: impl PeerPicker + 'static) {
        if self.peers.set(Box::new(picker)).is_err() {
            panic!("register_peer_picker called more than once for group {:?}", self.name);
        }
    }

    /// Fetches the value for `key`: local store, then owning peer, then the
    /// loader, populating the local store only in the last case.
    ///
    /// Concurrent misses on the same key are coalesced into one resolution;
    /// all callers receive the same value or the same error.
    pub fn get(&self, key: &str) -> Result<ByteView, GetError> {
        if key.is_empty() {
            return Err(GetError::EmptyKey);
        }

        if let Some(view) = self.main_cache.get(key) {
            trace!(group = %self.name, key, "cache hit");
            return Ok(view);
        }

        self.load(key)
    }

    /// Miss path: one flight per key, resolving via peer or loader.
    fn load(&self, key: &str) -> Result<ByteView, GetError> {
        self.flights.flight(key, || {
            if let Some(picker) = self.peers.get() {
                if let Some(peer) = picker.pick(key) {
                    match peer.get(&self.name, key) {
                        Ok(bytes) => {
                            debug!(group = %self.name, key, len = bytes.len(), "served by peer");
                            // The owner caches it; we stay a pass-through.
                            return Ok(ByteView::from(bytes));
                        },
                        Err(err) => {
                            warn!(
                                group = %self.name,
                                key,
                                error = %err,
                                "peer fetch failed, falling back to local load"
                            );
                        },
                    }
                }
            }
            self.load_locally(key)
        })
    }

    /// Resolves `key` through the loader and populates the local store.
    fn load_locally(&self, key: &str) -> Result<ByteView, GetError> {
        let bytes = self
            .loader
            .load(key)
            .map_err(|source| GetError::loader(key, source))?;

        let view = ByteView::from(bytes);
        self.main_cache.add(key, view.clone());
        debug!(group = %self.name, key, len = view.len(), "loaded and populated");
        Ok(view)
    }

    /// Returns `true` if `key` currently sits in the local store.
    ///
    /// Does not touch recency order; intended for observability and tests.
    pub fn is_cached(&self, key: &str) -> bool {
        self.main_cache.contains(key)
    }

    /// Number of entries in the local store.
    pub fn cached_entries(&self) -> usize {
        self.main_cache.len()
    }

    /// Byte footprint of the local store.
    pub fn used_bytes(&self) -> usize {
        self.main_cache.used_bytes()
    }

    /// Snapshot of the local store's hit/miss/eviction counters.
    pub fn stats(&self) -> StoreMetrics {
        self.main_cache.metrics()
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("cached_entries", &self.cached_entries())
            .field("has_peers", &self.peers.get().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_loader(
        table: &'static [(&'static str, &'static str)],
        calls: Arc<AtomicUsize>,
    ) -> impl Loader {
        move |key: &str| -> Result<Vec<u8>, BoxError> {
            calls.fetch_add(1, Ordering::SeqCst);
            table
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_bytes().to_vec())
                .ok_or_else(|| format!("{key} not exist").into())
        }
    }

    const SCORES: &[(&str, &str)] = &[("Tom", "630"), ("Jack", "589"), ("Sam", "567")];

    #[test]
    fn empty_key_is_rejected_before_any_work() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = new_group("unit-empty-key", 2 << 10, counting_loader(SCORES, calls.clone()));

        let err = group.get("").unwrap_err();
        assert!(err.is_empty_key());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(group.cached_entries(), 0);
    }

    #[test]
    fn miss_loads_and_populates_then_hits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = new_group("unit-populate", 2 << 10, counting_loader(SCORES, calls.clone()));

        let view = group.get("Tom").unwrap();
        assert_eq!(view.as_bytes(), b"630");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(group.is_cached("Tom"));

        let view = group.get("Tom").unwrap();
        assert_eq!(view.as_bytes(), b"630");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "second get must not hit the loader");
    }

    #[test]
    fn loader_error_is_not_cached_and_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = new_group("unit-loader-error", 2 << 10, counting_loader(SCORES, calls.clone()));

        let err = group.get("Zoe").unwrap_err();
        assert!(err.to_string().contains("Zoe"));
        assert!(!group.is_cached("Zoe"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The failure was not cached: a retry consults the loader again.
        let _ = group.get("Zoe").unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn struct_loaders_work_like_closures() {
        struct TableLoader;
        impl Loader for TableLoader {
            fn load(&self, key: &str) -> Result<Vec<u8>, BoxError> {
                Ok(format!("value-of-{key}").into_bytes())
            }
        }

        let group = new_group("unit-struct-loader", 2 << 10, TableLoader);
        assert_eq!(group.get("k").unwrap().as_bytes(), b"value-of-k");
    }

    #[test]
    fn registry_round_trips_groups() {
        let calls = Arc::new(AtomicUsize::new(0));
        let created = new_group("unit-registry", 2 << 10, counting_loader(SCORES, calls));

        let found = get_group("unit-registry").expect("registered group must be found");
        assert_eq!(found.name(), created.name());
        assert!(Arc::ptr_eq(&created, &found));

        assert!(get_group("unit-registry-nope").is_none());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_group_name_panics() {
        let mk = || {
            new_group("unit-duplicate", 1024, |_: &str| -> Result<Vec<u8>, BoxError> {
                Ok(Vec::new())
            })
        };
        let _first = mk();
        let _second = mk();
    }

    #[test]
    #[should_panic(expected = "more than once")]
    fn double_picker_registration_panics() {
        use crate::peers::{PeerGetter, PeerPicker};

        struct NoPeers;
        impl PeerPicker for NoPeers {
            fn pick(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
                None
            }
        }

        let group = new_group("unit-double-picker", 1024, |_: &str| -> Result<Vec<u8>, BoxError> {
            Ok(Vec::new())
        });
        group.register_peer_picker(NoPeers);
        group.register_peer_picker(NoPeers);
    }
}
