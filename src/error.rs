//! Error types at the cache boundary.
//!
//! ## Key Components
//!
//! - [`GetError`]: what [`Group::get`](crate::group::Group::get) can return —
//!   an empty key, or a loader failure. Cloneable so single-flight can
//!   broadcast one failure to every coalesced waiter verbatim.
//! - [`PeerError`]: failure of a peer fetch at the transport contract. Never
//!   surfaces from `Group::get`; the group logs it and falls back to the
//!   local loader, whose verdict wins.
//! - [`BoxError`]: the boxed error loaders produce.
//!
//! Programmer errors — registering a peer picker twice, reusing a group
//! name — are panics, not variants here: they are misconfiguration, not
//! runtime conditions.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Boxed error type produced by loaders and transport internals.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// GetError
// ---------------------------------------------------------------------------

/// Error returned by a group lookup.
///
/// Carries the loader's failure by shared reference so that the same error
/// instance can be handed to every waiter of a coalesced miss.
#[derive(Debug, Clone)]
pub enum GetError {
    /// The empty key is rejected before touching any state.
    EmptyKey,
    /// The authoritative loader failed; nothing was cached and the next
    /// lookup will retry.
    Loader {
        /// Key whose load failed.
        key: String,
        /// The loader's error, verbatim.
        source: Arc<dyn Error + Send + Sync + 'static>,
    },
}

impl GetError {
    /// Wraps a loader failure for `key`.
    pub(crate) fn loader(key: &str, source: BoxError) -> Self {
        GetError::Loader {
            key: key.to_owned(),
            source: Arc::from(source),
        }
    }

    /// Returns `true` for the empty-key caller error.
    pub fn is_empty_key(&self) -> bool {
        matches!(self, GetError::EmptyKey)
    }
}

impl fmt::Display for GetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GetError::EmptyKey => f.write_str("key must not be empty"),
            GetError::Loader { key, source } => {
                write!(f, "loader failed for key {key:?}: {source}")
            },
        }
    }
}

impl Error for GetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GetError::EmptyKey => None,
            GetError::Loader { source, .. } => {
                let source: &(dyn Error + 'static) = &**source;
                Some(source)
            },
        }
    }
}

// ---------------------------------------------------------------------------
// PeerError
// ---------------------------------------------------------------------------

/// Error returned by a [`PeerGetter`](crate::peers::PeerGetter).
///
/// Describes why a remote fetch failed: connection refused, non-200 status,
/// truncated body. The group treats any of these as "fall back to the local
/// loader".
#[derive(Debug)]
pub struct PeerError {
    message: String,
    source: Option<BoxError>,
}

impl PeerError {
    /// Creates a new `PeerError` with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a `PeerError` wrapping an underlying cause.
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PeerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for PeerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|err| {
            let err: &(dyn Error + 'static) = err;
            err
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn empty_key_display() {
        let err = GetError::EmptyKey;
        assert_eq!(err.to_string(), "key must not be empty");
        assert!(err.is_empty_key());
        assert!(err.source().is_none());
    }

    #[test]
    fn loader_error_preserves_cause() {
        let cause: BoxError = Box::new(io::Error::new(io::ErrorKind::NotFound, "Zoe not exist"));
        let err = GetError::loader("Zoe", cause);

        assert!(err.to_string().contains("Zoe"));
        assert!(err.to_string().contains("not exist"));
        assert!(err.source().is_some());
    }

    #[test]
    fn loader_error_clones_share_the_cause() {
        let cause: BoxError = Box::new(io::Error::other("db down"));
        let a = GetError::loader("k", cause);
        let b = a.clone();
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn peer_error_message_and_source() {
        let plain = PeerError::new("peer returned 503");
        assert_eq!(plain.message(), "peer returned 503");
        assert!(plain.source().is_none());

        let wrapped = PeerError::with_source("request failed", io::Error::other("refused"));
        assert_eq!(wrapped.to_string(), "request failed");
        assert!(wrapped.source().is_some());
    }

    #[test]
    fn errors_implement_std_error() {
        fn assert_error<T: Error>() {}
        assert_error::<GetError>();
        assert_error::<PeerError>();
    }
}
