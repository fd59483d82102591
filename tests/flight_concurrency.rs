// ==============================================
// SINGLE-FLIGHT CONCURRENCY TESTS (integration)
// ==============================================

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use peercache::ds::flight::FlightGroup;

#[test]
fn thousand_concurrent_callers_share_one_resolution() {
    let flights: Arc<FlightGroup<String>> = Arc::new(FlightGroup::new());
    let invocations = Arc::new(AtomicUsize::new(0));
    let callers = 1000;
    let barrier = Arc::new(Barrier::new(callers));

    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let flights = Arc::clone(&flights);
            let invocations = Arc::clone(&invocations);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                flights.flight("x", || {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(100));
                    "v".to_string()
                })
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "v");
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[test]
fn error_reaches_every_waiter_and_is_not_sticky() {
    let flights: Arc<FlightGroup<Result<String, String>>> = Arc::new(FlightGroup::new());
    let waiters = 32;
    let barrier = Arc::new(Barrier::new(waiters));

    let handles: Vec<_> = (0..waiters)
        .map(|_| {
            let flights = Arc::clone(&flights);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                flights.flight("k", || {
                    thread::sleep(Duration::from_millis(50));
                    Err("upstream down".to_string())
                })
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), Err("upstream down".to_string()));
    }

    // The failed record was cleared: a fresh call runs a fresh resolver.
    let recovered = flights.flight("k", || Ok("recovered".to_string()));
    assert_eq!(recovered, Ok("recovered".to_string()));
}

#[test]
fn flights_on_different_keys_run_concurrently() {
    let flights: Arc<FlightGroup<usize>> = Arc::new(FlightGroup::new());
    let keys = 8;
    let barrier = Arc::new(Barrier::new(keys));

    let handles: Vec<_> = (0..keys)
        .map(|i| {
            let flights = Arc::clone(&flights);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                flights.flight(&format!("key-{i}"), move || {
                    thread::sleep(Duration::from_millis(20));
                    i
                })
            })
        })
        .collect();

    let results: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (i, value) in results.into_iter().enumerate() {
        assert_eq!(value, i);
    }
}
