//! Single-flight call deduplication.
//!
//! Collapses concurrent calls for the same key into one: the first arrival
//! (the leader) runs the resolver, everyone else blocks until the leader
//! finishes and receives a clone of the same result — value or error,
//! verbatim. Once the call completes its record is dropped, so the next
//! arrival starts a fresh flight.
//!
//! This is the anti-stampede layer in front of loaders and peer fetches: a
//! thousand simultaneous misses on one key cost one upstream call.
//!
//! ## Locking
//!
//! The call map is guarded by a mutex on *every* access — lookup, install,
//! and delete. The mutex is never held while the resolver runs; waiters
//! block on the call's own condvar, not on the map. Late arrivals that
//! already cloned the call record keep observing its result even after the
//! record leaves the map.
//!
//! ## Example Usage
//!
//! ```
//! use peercache::ds::flight::FlightGroup;
//!
//! let flights: FlightGroup<u64> = FlightGroup::new();
//!
//! let value = flights.flight("answer", || 42);
//! assert_eq!(value, 42);
//!
//! // The record is gone: a new call runs a fresh resolver.
//! let value = flights.flight("answer", || 43);
//! assert_eq!(value, 43);
//! ```

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

/// One in-flight call: a write-once result slot plus a broadcast signal.
struct Call<T> {
    slot: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> Call<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }
}

/// Per-key in-flight call arena.
///
/// `T` is whatever the resolver produces — typically a `Result`, so that
/// errors are broadcast to waiters exactly like values.
pub struct FlightGroup<T> {
    calls: Mutex<FxHashMap<String, Arc<Call<T>>>>,
}

impl<T: Clone> FlightGroup<T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(FxHashMap::default()),
        }
    }

    /// Runs `resolve` for `key`, unless a call for `key` is already in
    /// flight — in that case blocks and returns that call's result instead.
    ///
    /// For overlapping invocations, exactly one resolver runs and every
    /// caller gets an identical result. Serial invocations each run their
    /// own resolver. No retries, no synthesized errors, no cancellation:
    /// waiters are released only when the resolver returns.
    pub fn flight<F>(&self, key: &str, resolve: F) -> T
    where
        F: FnOnce() -> T,
    {
        let call = {
            let mut calls = self.calls.lock();
            if let Some(existing) = calls.get(key) {
                let call = Arc::clone(existing);
                drop(calls);
                return Self::await_result(&call);
            }
            let call = Arc::new(Call::new());
            calls.insert(key.to_owned(), Arc::clone(&call));
            call
        };

        // Leader: resolve with no locks held, then broadcast.
        let result = resolve();

        {
            let mut slot = call.slot.lock();
            *slot = Some(result.clone());
            call.ready.notify_all();
        }

        // Retire the record so the next arrival starts fresh. Waiters that
        // already hold the call keep their reference.
        self.calls.lock().remove(key);

        result
    }

    fn await_result(call: &Call<T>) -> T {
        let mut slot = call.slot.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            call.ready.wait(&mut slot);
        }
    }
}

impl<T: Clone> Default for FlightGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for FlightGroup<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightGroup")
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}
