//! Per-connection receive buffer.
//!
//! Inbound bytes arrive from the transport in arbitrary chunks that rarely
//! line up with message boundaries. [`RecvBuffer`] accumulates them so the
//! framing layer can scan for a complete head, peel it off, and leave any
//! pipelined bytes of the next message in place.

use bytes::{Bytes, BytesMut};

/// A growable buffer of received-but-not-yet-consumed bytes.
///
/// Owned by exactly one connection's engine. Consumed prefixes are
/// physically released, so a long-lived keep-alive connection does not
/// accumulate memory proportional to its traffic. No size cap is enforced
/// here — the framing layer bounds growth before appending.
///
/// # Examples
///
/// ```
/// use filament::buffer::RecvBuffer;
///
/// let mut buf = RecvBuffer::new();
/// buf.append(b"hello world");
/// let hello = buf.split_to(5);
/// assert_eq!(&hello[..], b"hello");
/// assert_eq!(buf.as_slice(), b" world");
/// ```
#[derive(Debug, Default)]
pub struct RecvBuffer {
    inner: BytesMut,
}

impl RecvBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends incoming bytes to the end of the valid region.
    pub fn append(&mut self, bytes: &[u8]) {
        self.inner.extend_from_slice(bytes);
    }

    /// Removes the first `n` bytes and returns them.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`len`](Self::len) — consuming bytes that were
    /// never received is a caller bug, not a runtime condition.
    pub fn split_to(&mut self, n: usize) -> Bytes {
        assert!(
            n <= self.inner.len(),
            "split_to({n}) exceeds buffered length {}",
            self.inner.len()
        );
        self.inner.split_to(n).freeze()
    }

    /// Removes and discards the first `n` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`len`](Self::len), like [`split_to`](Self::split_to).
    pub fn consume(&mut self, n: usize) {
        let _ = self.split_to(n);
    }

    /// Returns the currently buffered bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    /// Returns the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_grows_valid_region() {
        let mut buf = RecvBuffer::new();
        assert!(buf.is_empty());
        buf.append(b"abc");
        buf.append(b"def");
        assert_eq!(buf.len(), 6);
        assert_eq!(buf.as_slice(), b"abcdef");
    }

    #[test]
    fn split_to_returns_prefix() {
        let mut buf = RecvBuffer::new();
        buf.append(b"abcdef");
        let head = buf.split_to(4);
        assert_eq!(&head[..], b"abcd");
        assert_eq!(buf.as_slice(), b"ef");
    }

    #[test]
    fn consume_discards_prefix() {
        let mut buf = RecvBuffer::new();
        buf.append(b"abcdef");
        buf.consume(2);
        assert_eq!(buf.as_slice(), b"cdef");
    }

    #[test]
    fn split_to_entire_buffer() {
        let mut buf = RecvBuffer::new();
        buf.append(b"xyz");
        let all = buf.split_to(3);
        assert_eq!(&all[..], b"xyz");
        assert!(buf.is_empty());
    }

    #[test]
    #[should_panic(expected = "exceeds buffered length")]
    fn consume_past_end_panics() {
        let mut buf = RecvBuffer::new();
        buf.append(b"ab");
        buf.consume(3);
    }

    #[test]
    fn append_after_consume() {
        let mut buf = RecvBuffer::new();
        buf.append(b"first");
        buf.consume(5);
        buf.append(b"second");
        assert_eq!(buf.as_slice(), b"second");
    }
}
