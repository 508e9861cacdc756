//! Pull-based wrapper over the raw transport.
//!
//! The engine and body readers never touch the transport directly; they
//! pull chunks from a [`Connection`], which owns the boxed stream and
//! latches its terminal state. Because a connection is driven by exactly
//! one task, every operation takes `&mut self` — "at most one outstanding
//! read" is enforced by the borrow checker rather than a runtime flag.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// The minimal contract consumed from the transport: read next available
/// bytes, write bytes, signal close or error. Implemented by anything
/// async-readable and -writable, e.g. `TcpStream` or an in-memory duplex.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// One connection's view of its transport.
///
/// End-of-stream and errors are latched: after a clean end every
/// [`read_chunk`](Self::read_chunk) returns an empty chunk, and after a
/// transport error every subsequent operation fails immediately with the
/// same error instead of touching the dead stream again.
pub struct Connection {
    io: Box<dyn Transport>,
    read_chunk_bytes: usize,
    ended: bool,
    failed: Option<(io::ErrorKind, String)>,
}

impl Connection {
    /// Wraps a transport. `read_chunk_bytes` bounds how much a single
    /// read may deliver.
    pub fn new(io: impl Transport + 'static, read_chunk_bytes: usize) -> Self {
        Self {
            io: Box::new(io),
            read_chunk_bytes,
            ended: false,
            failed: None,
        }
    }

    fn replay_failure(&self) -> Option<io::Error> {
        self.failed
            .as_ref()
            .map(|(kind, msg)| io::Error::new(*kind, msg.clone()))
    }

    /// Reads the next available chunk from the transport.
    ///
    /// An empty chunk means end-of-stream (idempotent once signaled).
    ///
    /// # Errors
    ///
    /// Returns the latched error if the connection already failed, or the
    /// transport error that just occurred (which is then latched).
    pub async fn read_chunk(&mut self) -> io::Result<Bytes> {
        if let Some(err) = self.replay_failure() {
            return Err(err);
        }
        if self.ended {
            return Ok(Bytes::new());
        }
        let mut chunk = BytesMut::with_capacity(self.read_chunk_bytes);
        match self.io.read_buf(&mut chunk).await {
            Ok(0) => {
                self.ended = true;
                Ok(Bytes::new())
            }
            Ok(_) => Ok(chunk.freeze()),
            Err(e) => {
                self.failed = Some((e.kind(), e.to_string()));
                Err(e)
            }
        }
    }

    /// Writes all of `bytes` to the transport.
    ///
    /// # Panics
    ///
    /// Panics on an empty payload — an end-of-body marker must never
    /// reach the transport, so writing zero bytes is a caller bug.
    ///
    /// # Errors
    ///
    /// Fails immediately with the latched error if the connection already
    /// failed; otherwise latches and returns any transport error.
    pub async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        assert!(!bytes.is_empty(), "zero-length write");
        if let Some(err) = self.replay_failure() {
            return Err(err);
        }
        if let Err(e) = self.io.write_all(bytes).await {
            self.failed = Some((e.kind(), e.to_string()));
            return Err(e);
        }
        Ok(())
    }

    /// Flushes buffered transport writes. Called once per response.
    pub async fn flush(&mut self) -> io::Result<()> {
        if let Some(err) = self.replay_failure() {
            return Err(err);
        }
        if let Err(e) = self.io.flush().await {
            self.failed = Some((e.kind(), e.to_string()));
            return Err(e);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("ended", &self.ended)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn reads_available_bytes() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut conn = Connection::new(server, 4096);

        client.write_all(b"hello").await.unwrap();
        let chunk = conn.read_chunk().await.unwrap();
        assert_eq!(&chunk[..], b"hello");
    }

    #[tokio::test]
    async fn chunk_size_bounds_a_single_read() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut conn = Connection::new(server, 4);

        client.write_all(b"abcdefgh").await.unwrap();
        let first = conn.read_chunk().await.unwrap();
        assert_eq!(&first[..], b"abcd");
        let second = conn.read_chunk().await.unwrap();
        assert_eq!(&second[..], b"efgh");
    }

    #[tokio::test]
    async fn end_of_stream_is_latched_and_idempotent() {
        let (client, server) = tokio::io::duplex(64);
        let mut conn = Connection::new(server, 4096);

        drop(client);
        assert!(conn.read_chunk().await.unwrap().is_empty());
        assert!(conn.read_chunk().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_reaches_peer() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut conn = Connection::new(server, 4096);

        conn.write_all(b"pong").await.unwrap();
        conn.flush().await.unwrap();
        let mut got = [0u8; 4];
        tokio::io::AsyncReadExt::read_exact(&mut client, &mut got)
            .await
            .unwrap();
        assert_eq!(&got, b"pong");
    }

    #[tokio::test]
    async fn error_is_latched_across_operations() {
        let (client, server) = tokio::io::duplex(64);
        let mut conn = Connection::new(server, 4096);

        drop(client);
        let err = conn.write_all(b"x").await.unwrap_err();
        let kind = err.kind();
        // Every later operation replays the failure without touching the
        // transport.
        assert_eq!(conn.read_chunk().await.unwrap_err().kind(), kind);
        assert_eq!(conn.write_all(b"y").await.unwrap_err().kind(), kind);
        assert_eq!(conn.flush().await.unwrap_err().kind(), kind);
    }

    #[tokio::test]
    #[should_panic(expected = "zero-length write")]
    async fn zero_length_write_is_a_caller_bug() {
        let (_client, server) = tokio::io::duplex(64);
        let mut conn = Connection::new(server, 4096);
        let _ = conn.write_all(b"").await;
    }
}
