pub mod lru;

pub use lru::{ByteSized, ConcurrentLruStore, EvictObserver, LruStore, StoreMetrics};
