//! Immutable, length-aware cached value.
//!
//! [`ByteView`] is the only value type the cache layer traffics in. It wraps
//! a byte sequence behind a reference count so that clones are pointer-sized,
//! while the bytes themselves can never be mutated once captured: ingest
//! copies (or takes ownership of) the caller's buffer, and egress hands out
//! either a borrowed slice or a fresh copy.
//!
//! ## Key Components
//!
//! - [`ByteView`]: `Arc<[u8]>`-backed immutable byte sequence
//! - [`ByteSized`](crate::store::lru::ByteSized) impl: length feeds LRU
//!   byte accounting
//!
//! ## Example Usage
//!
//! ```
//! use peercache::ByteView;
//!
//! let view = ByteView::new(b"630");
//! assert_eq!(view.len(), 3);
//! assert_eq!(view.as_bytes(), b"630");
//!
//! // Clones share the same backing bytes.
//! let other = view.clone();
//! assert_eq!(other, view);
//!
//! // Materializing an owned copy is explicit.
//! let owned: Vec<u8> = view.to_vec();
//! assert_eq!(owned, b"630");
//! ```

use std::fmt;
use std::sync::Arc;

use crate::store::lru::ByteSized;

/// Immutable view over cached bytes.
///
/// Cheap to clone and share (reference-counted), expensive to materialize by
/// value — callers that need ownership pay for it explicitly via
/// [`to_vec`](ByteView::to_vec).
#[derive(Clone, PartialEq, Eq)]
pub struct ByteView {
    bytes: Arc<[u8]>,
}

impl ByteView {
    /// Captures a copy of `bytes`.
    ///
    /// The copy is the trust boundary: the caller keeps its buffer, the view
    /// keeps its own, and neither can observe mutation by the other.
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: Arc::from(bytes),
        }
    }

    /// Number of bytes in the view.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the view holds no bytes.
    ///
    /// A zero-length view is a legitimate cached value (e.g. a remote peer
    /// answering with an empty body), not an absence marker.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrows the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns a freshly allocated copy of the bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }
}

impl ByteSized for ByteView {
    fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

impl From<Vec<u8>> for ByteView {
    /// Takes ownership of the buffer without copying.
    ///
    /// Ownership transfer is as good as a copy here: the caller no longer
    /// holds the buffer, so the immutability guarantee still holds.
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::from(bytes),
        }
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_copies_input() {
        let mut buf = b"hello".to_vec();
        let view = ByteView::new(&buf);
        buf[0] = b'X';
        assert_eq!(view.as_bytes(), b"hello");
    }

    #[test]
    fn to_vec_returns_independent_copy() {
        let view = ByteView::new(b"data");
        let mut copy = view.to_vec();
        copy[0] = b'X';
        assert_eq!(view.as_bytes(), b"data");
    }

    #[test]
    fn len_matches_byte_count() {
        assert_eq!(ByteView::new(b"").len(), 0);
        assert!(ByteView::new(b"").is_empty());
        assert_eq!(ByteView::new(b"abc").len(), 3);
        assert_eq!(ByteView::new(b"abc").byte_len(), 3);
    }

    #[test]
    fn clones_are_equal_and_share_bytes() {
        let a = ByteView::new(b"shared");
        let b = a.clone();
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.bytes, &b.bytes));
    }

    #[test]
    fn display_renders_lossy_utf8() {
        assert_eq!(ByteView::new(b"630").to_string(), "630");
    }

    #[test]
    fn from_str_and_vec() {
        let from_str = ByteView::from("abc");
        let from_vec = ByteView::from(b"abc".to_vec());
        assert_eq!(from_str, from_vec);
    }
}
