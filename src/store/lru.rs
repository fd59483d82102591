//! Byte-accounted LRU store.
//!
//! The store that backs every cache group: a string-keyed map plus a
//! doubly linked recency list, bounded by total bytes rather than entry
//! count. Eviction is strict LRU and runs inside `add` until the store is
//! back under its byte budget.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                      LruStore<V>                             │
//!   │                                                              │
//!   │   FxHashMap<String, NonNull<Node>>     used_bytes ≤ max_bytes│
//!   │   ┌─────────┬──────────────────────┐                         │
//!   │   │  "Tom"  │ ───────────────┐     │                         │
//!   │   │  "Jack" │ ─────────┐     │     │                         │
//!   │   └─────────┴──────────┼─────┼─────┘                         │
//!   │                        ▼     ▼                               │
//!   │   head ──► [Jack] ◄──► [Tom] ◄── tail                        │
//!   │            (MRU)             (LRU ── next victim)            │
//!   └──────────────────────────────────────────────────────────────┘
//!
//!   used_bytes = Σ (key.len() + value.byte_len()) over live entries
//! ```
//!
//! ## Core Operations
//!
//! | Method            | Complexity | Description                             |
//! |-------------------|------------|-----------------------------------------|
//! | `get(key)`        | O(1)       | Lookup; promotes the entry to MRU       |
//! | `add(key, value)` | O(1)*      | Insert or update-in-place, then evict   |
//! | `remove_oldest()` | O(1)       | Evict the LRU entry, run the observer   |
//! | `len()`           | O(1)       | Live entry count                        |
//! | `used_bytes()`    | O(1)       | Current byte footprint                  |
//!
//! \* amortized; an oversized `add` may evict the whole store.
//!
//! ## Capacity Semantics
//!
//! - `max_bytes == 0` means unbounded: the eviction loop never runs.
//! - Updating an existing key adjusts accounting by `len(new) − len(old)`
//!   in place; the key's bytes are only counted once, at insertion.
//! - An entry larger than `max_bytes` drains everything else and is then
//!   evicted itself, leaving the store empty. That is the contract, not a
//!   failure: all operations are total.
//!
//! ## Eviction Observer
//!
//! An optional callback receives each evicted `(key, value)` pair. It runs
//! after the entry has left both the map and the list and after
//! `used_bytes` has been decremented, so the observer always sees a
//! consistent store.
//!
//! ## Example Usage
//!
//! ```
//! use peercache::store::lru::LruStore;
//! use peercache::ByteView;
//!
//! let mut store: LruStore<ByteView> = LruStore::new(64);
//! store.add("Tom", ByteView::from("630"));
//!
//! assert_eq!(store.len(), 1);
//! assert_eq!(store.used_bytes(), "Tom".len() + "630".len());
//! assert_eq!(store.get("Tom").map(ByteView::to_vec), Some(b"630".to_vec()));
//! assert!(store.get("Zoe").is_none());
//! ```
//!
//! ## Thread Safety
//!
//! - [`LruStore`] is single-threaded (`&mut` for every touch, including
//!   `get`, which reorders the list).
//! - [`ConcurrentLruStore`] wraps it in one `parking_lot::Mutex` covering
//!   map and list together, and layers atomic hit/miss counters on top.

use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Capability the store requires of its values: a byte length.
///
/// The length is the value's contribution to [`LruStore::used_bytes`];
/// together with the key length it decides when eviction triggers.
pub trait ByteSized {
    /// Size of the value in bytes for accounting purposes.
    fn byte_len(&self) -> usize;
}

impl ByteSized for String {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ByteSized for Vec<u8> {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

/// Callback invoked with each evicted `(key, value)` pair.
pub type EvictObserver<V> = Box<dyn FnMut(&str, &V) + Send>;

/// Node in the recency list.
///
/// The key lives in the node as well as the map so that evicting from the
/// tail can remove the map entry without a reverse lookup.
#[repr(C)]
struct Node<V> {
    prev: Option<NonNull<Node<V>>>,
    next: Option<NonNull<Node<V>>>,
    key: String,
    value: V,
}

/// Byte-bounded LRU store over a HashMap + raw-pointer linked list.
///
/// ## Memory Safety
///
/// - Nodes are heap-allocated and tracked via `NonNull` pointers.
/// - The map owns the only mapping from key to node pointer; every node is
///   reachable from the map and vice versa.
/// - All nodes are freed in `Drop` by draining the list.
pub struct LruStore<V> {
    map: FxHashMap<String, NonNull<Node<V>>>,
    head: Option<NonNull<Node<V>>>,
    tail: Option<NonNull<Node<V>>>,
    max_bytes: usize,
    used_bytes: usize,
    on_evict: Option<EvictObserver<V>>,
}

// SAFETY: LruStore can move between threads if V can. The raw pointers only
// reference heap memory owned by the struct itself.
unsafe impl<V: Send> Send for LruStore<V> {}

impl<V: ByteSized> LruStore<V> {
    /// Creates a store bounded by `max_bytes` total footprint.
    ///
    /// `max_bytes == 0` disables eviction entirely.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            map: FxHashMap::default(),
            head: None,
            tail: None,
            max_bytes,
            used_bytes: 0,
            on_evict: None,
        }
    }

    /// Creates a bounded store whose evictions are reported to `observer`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::{Arc, Mutex};
    /// use peercache::store::lru::LruStore;
    ///
    /// let evicted = Arc::new(Mutex::new(Vec::new()));
    /// let sink = Arc::clone(&evicted);
    /// let mut store = LruStore::with_observer(
    ///     4,
    ///     Box::new(move |key, _value: &String| sink.lock().unwrap().push(key.to_owned())),
    /// );
    ///
    /// store.add("a", "1".to_string());   // 2 bytes
    /// store.add("b", "2".to_string());   // 4 bytes, at the limit
    /// store.add("c", "333".to_string()); // 4 more: "a" then "b" go
    ///
    /// assert_eq!(*evicted.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
    /// ```
    pub fn with_observer(max_bytes: usize, observer: EvictObserver<V>) -> Self {
        let mut store = Self::new(max_bytes);
        store.on_evict = Some(observer);
        store
    }

    /// Looks up `key`, promoting the entry to the most-recent position.
    ///
    /// A miss does not materialize an entry.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let node_ptr = *self.map.get(key)?;

        self.detach(node_ptr);
        self.attach_front(node_ptr);

        #[cfg(debug_assertions)]
        self.validate_invariants();

        unsafe { Some(&(*node_ptr.as_ptr()).value) }
    }

    /// Inserts `value` under `key`, or updates the existing entry in place.
    ///
    /// Either way the entry ends at the most-recent position. The store
    /// then evicts from the least-recent end until `used_bytes` is back
    /// within `max_bytes` (never, when unbounded).
    pub fn add(&mut self, key: &str, value: V) {
        if let Some(&node_ptr) = self.map.get(key) {
            // Update in place: delta accounting, key bytes already counted.
            let node = unsafe { &mut *node_ptr.as_ptr() };
            let old_len = node.value.byte_len();
            let new_len = value.byte_len();
            node.value = value;
            self.used_bytes -= old_len;
            self.used_bytes += new_len;

            self.detach(node_ptr);
            self.attach_front(node_ptr);
        } else {
            let node = Box::new(Node {
                prev: None,
                next: None,
                key: key.to_owned(),
                value,
            });
            let entry_bytes = key.len() + node.value.byte_len();
            let node_ptr = NonNull::new(Box::into_raw(node)).unwrap();

            self.map.insert(key.to_owned(), node_ptr);
            self.attach_front(node_ptr);
            self.used_bytes += entry_bytes;
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes {
            self.remove_oldest();
        }

        #[cfg(debug_assertions)]
        self.validate_invariants();
    }

    /// Evicts the least-recently-used entry, returning it.
    ///
    /// The eviction observer (if any) runs after the entry has been
    /// unlinked and the accounting updated.
    pub fn remove_oldest(&mut self) -> Option<(String, V)> {
        let node = self.pop_tail()?;
        self.map.remove(&node.key);
        self.used_bytes -= node.key.len() + node.value.byte_len();

        if let Some(observer) = self.on_evict.as_mut() {
            observer(&node.key, &node.value);
        }

        self.validate_invariants();

        Some((node.key, node.value))
    }

    /// Returns `true` without touching recency order.
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Live entry count.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Current byte footprint: `Σ (key.len() + value.byte_len())`.
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Configured byte budget (`0` = unbounded).
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate internal invariants (debug builds only).
    fn validate_invariants(&self) {
        #[cfg(debug_assertions)]
        {
            if self.map.is_empty() {
                debug_assert!(self.head.is_none());
                debug_assert!(self.tail.is_none());
                debug_assert_eq!(self.used_bytes, 0);
                return;
            }

            let mut count = 0usize;
            let mut bytes = 0usize;
            let mut current = self.head;
            while let Some(ptr) = current {
                count += 1;
                unsafe {
                    let node = ptr.as_ref();
                    debug_assert!(self.map.contains_key(&node.key));
                    bytes += node.key.len() + node.value.byte_len();
                    current = node.next;
                }
                if count > self.map.len() {
                    panic!("cycle detected in recency list");
                }
            }

            debug_assert_eq!(count, self.map.len());
            debug_assert_eq!(bytes, self.used_bytes);
        }
    }
}

// List plumbing needs no value bounds; Drop relies on that.
impl<V> LruStore<V> {
    /// Detach a node from the linked list without removing it from the map.
    #[inline(always)]
    fn detach(&mut self, node_ptr: NonNull<Node<V>>) {
        unsafe {
            let node = node_ptr.as_ref();
            let prev = node.prev;
            let next = node.next;

            match prev {
                Some(mut p) => p.as_mut().next = next,
                None => self.head = next,
            }

            match next {
                Some(mut n) => n.as_mut().prev = prev,
                None => self.tail = prev,
            }
        }
    }

    /// Attach a node at the front (MRU position).
    #[inline(always)]
    fn attach_front(&mut self, mut node_ptr: NonNull<Node<V>>) {
        unsafe {
            let node = node_ptr.as_mut();
            node.prev = None;
            node.next = self.head;

            match self.head {
                Some(mut h) => h.as_mut().prev = Some(node_ptr),
                None => self.tail = Some(node_ptr),
            }

            self.head = Some(node_ptr);
        }
    }

    /// Pop the tail node (LRU) and take ownership of it.
    #[inline(always)]
    fn pop_tail(&mut self) -> Option<Box<Node<V>>> {
        self.tail.map(|tail_ptr| unsafe {
            let node = Box::from_raw(tail_ptr.as_ptr());

            self.tail = node.prev;
            match self.tail {
                Some(mut t) => t.as_mut().next = None,
                None => self.head = None,
            }

            node
        })
    }
}

// Free all heap-allocated nodes when the store is dropped. The observer is
// not consulted: dropping the store is not an eviction.
impl<V> Drop for LruStore<V> {
    fn drop(&mut self) {
        while self.pop_tail().is_some() {}
        self.map.clear();
    }
}

impl<V: ByteSized> fmt::Debug for LruStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruStore")
            .field("len", &self.len())
            .field("used_bytes", &self.used_bytes)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Metrics counters
// =============================================================================

/// Snapshot of a concurrent store's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreMetrics {
    /// Successful lookups.
    pub hits: u64,
    /// Failed lookups.
    pub misses: u64,
    /// New key insertions.
    pub inserts: u64,
    /// Value updates for existing keys.
    pub updates: u64,
    /// LRU evictions triggered by the byte budget.
    pub evictions: u64,
}

/// Counters using atomics so reads never take the store lock.
#[derive(Debug, Default)]
struct StoreCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    evictions: AtomicU64,
}

impl StoreCounters {
    fn snapshot(&self) -> StoreMetrics {
        StoreMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Concurrent wrapper
// =============================================================================

/// Thread-safe wrapper around [`LruStore`].
///
/// A single mutex guards the map and the recency list together: even reads
/// reorder the list, so there is no read-mostly fast path to exploit.
/// Counters sit outside the lock as atomics.
///
/// # Example
///
/// ```
/// use peercache::store::lru::ConcurrentLruStore;
/// use peercache::ByteView;
///
/// let store: ConcurrentLruStore<ByteView> = ConcurrentLruStore::new(1024);
/// store.add("Tom", ByteView::from("630"));
///
/// assert_eq!(store.get("Tom"), Some(ByteView::from("630")));
/// assert_eq!(store.get("Zoe"), None);
///
/// let metrics = store.metrics();
/// assert_eq!(metrics.hits, 1);
/// assert_eq!(metrics.misses, 1);
/// ```
pub struct ConcurrentLruStore<V> {
    inner: Mutex<LruStore<V>>,
    metrics: StoreCounters,
}

impl<V: ByteSized + Clone + Send> ConcurrentLruStore<V> {
    /// Creates a concurrent store bounded by `max_bytes`.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(LruStore::new(max_bytes)),
            metrics: StoreCounters::default(),
        }
    }

    /// Looks up `key`, promoting it to most-recent on a hit.
    ///
    /// Returns a clone of the stored value; for [`ByteView`](crate::ByteView)
    /// that is a reference-count bump, not a byte copy.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut store = self.inner.lock();
        match store.get(key).cloned() {
            Some(value) => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            },
            None => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                None
            },
        }
    }

    /// Inserts or updates `key`, evicting as needed.
    pub fn add(&self, key: &str, value: V) {
        let mut store = self.inner.lock();
        let len_before = store.len();
        let existed = store.contains(key);
        store.add(key, value);

        if existed {
            self.metrics.updates.fetch_add(1, Ordering::Relaxed);
        } else {
            self.metrics.inserts.fetch_add(1, Ordering::Relaxed);
        }
        // Entries that vanished during this add were evicted by the budget.
        let expected = len_before + usize::from(!existed);
        let evicted = expected.saturating_sub(store.len());
        if evicted > 0 {
            self.metrics
                .evictions
                .fetch_add(evicted as u64, Ordering::Relaxed);
        }
    }

    /// Returns `true` without touching recency order.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().contains(key)
    }

    /// Live entry count.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Current byte footprint.
    pub fn used_bytes(&self) -> usize {
        self.inner.lock().used_bytes()
    }

    /// Snapshot of the hit/miss/insert/eviction counters.
    pub fn metrics(&self) -> StoreMetrics {
        self.metrics.snapshot()
    }
}

impl<V: ByteSized> fmt::Debug for ConcurrentLruStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.inner.lock();
        f.debug_struct("ConcurrentLruStore")
            .field("len", &store.len())
            .field("used_bytes", &store.used_bytes())
            .field("max_bytes", &store.max_bytes())
            .finish_non_exhaustive()
    }
}
