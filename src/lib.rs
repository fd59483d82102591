//! peercache: distributed read-through in-memory cache primitives.
//!
//! A fleet of peer nodes shares one logical cache: any node answers any
//! key — from its byte-bounded local LRU store, from the peer the
//! consistent-hash ring says owns the key, or by invoking the group's
//! loader against the authoritative source. Concurrent misses on the same
//! key collapse into a single upstream call.

pub mod byte_view;
pub mod config;
pub mod ds;
pub mod error;
pub mod group;
pub mod http;
pub mod peers;
pub mod prelude;
pub mod store;

pub use byte_view::ByteView;
