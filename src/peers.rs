//! Peer-selection contract between groups and the transport layer.
//!
//! Two small traits are the only thing a [`Group`](crate::group::Group)
//! knows about the fleet. Everything else — consistent hashing against the
//! node's own identity, HTTP, encoding — lives behind them (see
//! [`crate::http`] for the shipped implementation).

use std::sync::Arc;

use crate::error::PeerError;

/// Fetches a cached value from one specific remote peer.
///
/// The wire format is the implementation's concern; the group only sees
/// bytes. An empty body is a successful zero-length hit, not an error.
pub trait PeerGetter: Send + Sync {
    /// Fetches the value for `key` in the named group from this peer.
    fn get(&self, group: &str, key: &str) -> Result<Vec<u8>, PeerError>;
}

/// Routes a key to the peer that owns it.
///
/// `None` means "serve locally": either the key hashes to this very node,
/// or there are no peers to ask. The getter comes back shared so pickers
/// can keep their routing tables behind their own lock.
pub trait PeerPicker: Send + Sync {
    /// Picks the remote owner of `key`, if there is one.
    fn pick(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}
