//! Lazy message-body consumption.
//!
//! A body is never buffered eagerly. The framing layer hands the handler
//! a [`BodyReader`] whose strategy was chosen once from the request
//! headers: a one-shot in-memory reader, or a connection-bounded reader
//! that pulls exactly the declared number of bytes through the shared
//! receive buffer. Chunked transfer encoding and read-until-close are
//! recognized but unimplemented framing strategies; requests demanding
//! them are rejected with `501 Not Implemented`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::buffer::RecvBuffer;
use crate::conn::Connection;
use crate::error::ProtocolError;
use crate::http::Request;

/// A lazy reader over one message body.
///
/// Each [`read`](Self::read) yields a chunk of at most the remaining
/// bytes; an empty chunk means end-of-body, and further reads keep
/// returning empty. [`len`](Self::len) reports the total body size when
/// it is known at construction, `None` when only streaming could reveal
/// it.
pub struct BodyReader {
    kind: Kind,
}

enum Kind {
    /// A body already in memory, served in a single chunk.
    Memory { data: Bytes, served: bool },
    /// Exactly `remaining` more bytes, pulled through the connection's
    /// receive buffer. The counter is shared with the engine's drain
    /// handle so unread bytes can be discarded before connection reuse.
    Bounded {
        declared: u64,
        remaining: Arc<AtomicU64>,
        conn: Arc<Mutex<Connection>>,
        buf: Arc<Mutex<RecvBuffer>>,
    },
}

/// Selects the body strategy for a parsed request.
///
/// Precedence: a body-forbidding method (GET, HEAD) must not declare a
/// body at all; then `Content-Length` wins; then a chunked marker or a
/// missing length are both unimplemented framing strategies.
///
/// # Errors
///
/// - [`ProtocolError::BodyNotAllowed`] — GET/HEAD with a nonzero length
///   or any `Transfer-Encoding`.
/// - [`ProtocolError::InvalidContentLength`] — a length that is not a
///   plain non-negative decimal (zero is fine, for any method).
/// - [`ProtocolError::ChunkedUnsupported`] /
///   [`ProtocolError::UnframedBody`] — the two extension points.
pub fn for_request(
    req: &Request,
    conn: &Arc<Mutex<Connection>>,
    buf: &Arc<Mutex<RecvBuffer>>,
) -> Result<BodyReader, ProtocolError> {
    let length = req.headers().get("content-length");
    let encoding = req.headers().get("transfer-encoding");

    if !req.method().allows_body() {
        if let Some(value) = length {
            if parse_content_length(value)? != 0 {
                return Err(ProtocolError::BodyNotAllowed(req.method()));
            }
        }
        if encoding.is_some() {
            return Err(ProtocolError::BodyNotAllowed(req.method()));
        }
        return Ok(BodyReader::empty());
    }

    if let Some(value) = length {
        let declared = parse_content_length(value)?;
        return Ok(BodyReader::bounded(declared, conn.clone(), buf.clone()));
    }

    if encoding.is_some_and(has_chunked_token) {
        return Err(ProtocolError::ChunkedUnsupported);
    }
    Err(ProtocolError::UnframedBody)
}

/// Plain non-negative decimal only: no sign, no whitespace, no garbage.
fn parse_content_length(value: &str) -> Result<u64, ProtocolError> {
    let invalid = || ProtocolError::InvalidContentLength(value.to_owned());
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    value.parse().map_err(|_| invalid())
}

fn has_chunked_token(value: &str) -> bool {
    value
        .split(',')
        .any(|t| t.trim().eq_ignore_ascii_case("chunked"))
}

impl BodyReader {
    /// A reader over a body that is already in memory.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            kind: Kind::Memory {
                data: data.into(),
                served: false,
            },
        }
    }

    /// A zero-length body.
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    fn bounded(declared: u64, conn: Arc<Mutex<Connection>>, buf: Arc<Mutex<RecvBuffer>>) -> Self {
        Self {
            kind: Kind::Bounded {
                declared,
                remaining: Arc::new(AtomicU64::new(declared)),
                conn,
                buf,
            },
        }
    }

    /// Total body size when known at construction, `None` for streaming
    /// strategies whose size only the stream can reveal.
    pub fn len(&self) -> Option<u64> {
        match &self.kind {
            Kind::Memory { data, .. } => Some(data.len() as u64),
            Kind::Bounded { declared, .. } => Some(*declared),
        }
    }

    /// Reads the next chunk of the body.
    ///
    /// An empty chunk means the body is exhausted; reading again keeps
    /// returning empty.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::UnexpectedEof`] if the transport ends before the
    /// declared length is consumed — fatal for the connection — or any
    /// transport error.
    pub async fn read(&mut self) -> Result<Bytes, ProtocolError> {
        match &mut self.kind {
            Kind::Memory { data, served } => {
                if *served {
                    return Ok(Bytes::new());
                }
                *served = true;
                Ok(data.clone())
            }
            Kind::Bounded {
                remaining,
                conn,
                buf,
                ..
            } => {
                let rest = remaining.load(Ordering::Relaxed);
                if rest == 0 {
                    return Ok(Bytes::new());
                }
                let mut buf = buf.lock().await;
                if buf.is_empty() {
                    let chunk = conn.lock().await.read_chunk().await?;
                    if chunk.is_empty() {
                        return Err(ProtocolError::UnexpectedEof);
                    }
                    buf.append(&chunk);
                }
                let take = (buf.len() as u64).min(rest) as usize;
                let bytes = buf.split_to(take);
                remaining.fetch_sub(take as u64, Ordering::Relaxed);
                Ok(bytes)
            }
        }
    }

    /// A second reader over the same bounded body, sharing its remaining
    /// count. The engine uses this to discard whatever the handler left
    /// unread before reusing the connection. `None` for in-memory bodies,
    /// which hold no connection state.
    pub(crate) fn drain_handle(&self) -> Option<BodyReader> {
        match &self.kind {
            Kind::Memory { .. } => None,
            Kind::Bounded {
                declared,
                remaining,
                conn,
                buf,
            } => Some(Self {
                kind: Kind::Bounded {
                    declared: *declared,
                    remaining: remaining.clone(),
                    conn: conn.clone(),
                    buf: buf.clone(),
                },
            }),
        }
    }
}

impl std::fmt::Debug for BodyReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            Kind::Memory { data, served } => f
                .debug_struct("BodyReader::Memory")
                .field("len", &data.len())
                .field("served", served)
                .finish(),
            Kind::Bounded {
                declared,
                remaining,
                ..
            } => f
                .debug_struct("BodyReader::Bounded")
                .field("declared", declared)
                .field("remaining", &remaining.load(Ordering::Relaxed))
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request;
    use tokio::io::AsyncWriteExt;

    /// Parses a head and returns the request plus the shared
    /// buffer/connection pair, with any leftover bytes still buffered.
    fn setup(
        raw: &[u8],
        io: impl crate::conn::Transport + 'static,
    ) -> (Request, Arc<Mutex<Connection>>, Arc<Mutex<RecvBuffer>>) {
        let mut buf = RecvBuffer::new();
        buf.append(raw);
        let req = request::try_parse(&mut buf, 8192).unwrap().unwrap();
        (
            req,
            Arc::new(Mutex::new(Connection::new(io, 4096))),
            Arc::new(Mutex::new(buf)),
        )
    }

    fn idle_io() -> impl crate::conn::Transport + 'static {
        let (_client, server) = tokio::io::duplex(64);
        server
    }

    #[tokio::test]
    async fn get_without_body_headers_is_empty() {
        let (req, conn, buf) = setup(b"GET / HTTP/1.1\r\n\r\n", idle_io());
        let mut body = for_request(&req, &conn, &buf).unwrap();
        assert_eq!(body.len(), Some(0));
        assert!(body.read().await.unwrap().is_empty());
        assert!(body.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_with_zero_length_is_allowed() {
        let (req, conn, buf) = setup(b"GET / HTTP/1.1\r\nContent-Length: 0\r\n\r\n", idle_io());
        let body = for_request(&req, &conn, &buf).unwrap();
        assert_eq!(body.len(), Some(0));
    }

    #[tokio::test]
    async fn get_with_nonzero_length_rejected() {
        let (req, conn, buf) = setup(b"GET / HTTP/1.1\r\nContent-Length: 5\r\n\r\n", idle_io());
        let err = for_request(&req, &conn, &buf).unwrap_err();
        assert!(matches!(err, ProtocolError::BodyNotAllowed(_)));
    }

    #[tokio::test]
    async fn head_with_encoding_rejected() {
        let (req, conn, buf) = setup(
            b"HEAD / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n",
            idle_io(),
        );
        let err = for_request(&req, &conn, &buf).unwrap_err();
        assert!(matches!(err, ProtocolError::BodyNotAllowed(_)));
    }

    #[tokio::test]
    async fn bad_content_length_rejected() {
        for bad in ["-1", "abc", "+5", "", "1 2", "0x10"] {
            let head = format!("POST / HTTP/1.1\r\nContent-Length: {bad}\r\n\r\n");
            let (req, conn, buf) = setup(head.as_bytes(), idle_io());
            let err = for_request(&req, &conn, &buf).unwrap_err();
            assert!(
                matches!(err, ProtocolError::InvalidContentLength(_)),
                "{bad:?}"
            );
        }
    }

    #[tokio::test]
    async fn chunked_encoding_unsupported() {
        let (req, conn, buf) = setup(
            b"POST / HTTP/1.1\r\nTransfer-Encoding: gzip, chunked\r\n\r\n",
            idle_io(),
        );
        let err = for_request(&req, &conn, &buf).unwrap_err();
        assert!(matches!(err, ProtocolError::ChunkedUnsupported));
    }

    #[tokio::test]
    async fn missing_length_unsupported() {
        for head in [
            &b"POST / HTTP/1.1\r\n\r\n"[..],
            b"POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n",
        ] {
            let (req, conn, buf) = setup(head, idle_io());
            let err = for_request(&req, &conn, &buf).unwrap_err();
            assert!(matches!(err, ProtocolError::UnframedBody));
        }
    }

    #[tokio::test]
    async fn bounded_reads_buffered_then_streamed_bytes() {
        let (mut client, server) = tokio::io::duplex(64);
        let (req, conn, buf) = setup(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nhell", server);
        let mut body = for_request(&req, &conn, &buf).unwrap();
        assert_eq!(body.len(), Some(10));

        // First chunk comes from bytes over-read into the buffer.
        assert_eq!(&body.read().await.unwrap()[..], b"hell");

        // The rest arrives from the transport.
        client.write_all(b"o worl").await.unwrap();
        assert_eq!(&body.read().await.unwrap()[..], b"o worl");

        assert!(body.read().await.unwrap().is_empty());
        assert!(body.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bounded_never_reads_past_declared_length() {
        // The buffer holds the 3-byte body plus a pipelined next request.
        let (req, conn, buf) = setup(
            b"POST / HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET / HTTP/1.1\r\n\r\n",
            idle_io(),
        );
        let mut body = for_request(&req, &conn, &buf).unwrap();
        assert_eq!(&body.read().await.unwrap()[..], b"abc");
        assert!(body.read().await.unwrap().is_empty());
        assert_eq!(buf.lock().await.as_slice(), b"GET / HTTP/1.1\r\n\r\n");
    }

    #[tokio::test]
    async fn truncated_body_is_fatal() {
        let (client, server) = tokio::io::duplex(64);
        let (req, conn, buf) = setup(b"POST / HTTP/1.1\r\nContent-Length: 8\r\n\r\nabc", server);
        let mut body = for_request(&req, &conn, &buf).unwrap();
        assert_eq!(&body.read().await.unwrap()[..], b"abc");

        drop(client); // transport ends with 5 bytes still owed
        let err = body.read().await.unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedEof));
    }

    #[tokio::test]
    async fn memory_reader_is_one_shot() {
        let mut body = BodyReader::from_bytes("hello world.\n");
        assert_eq!(body.len(), Some(13));
        assert_eq!(&body.read().await.unwrap()[..], b"hello world.\n");
        assert!(body.read().await.unwrap().is_empty());
        // Length stays the declared total after exhaustion.
        assert_eq!(body.len(), Some(13));
    }

    #[tokio::test]
    async fn drain_handle_shares_remaining_count() {
        let (req, conn, buf) = setup(b"POST / HTTP/1.1\r\nContent-Length: 6\r\n\r\nabcdef", idle_io());
        let mut body = for_request(&req, &conn, &buf).unwrap();
        let mut drain = body.drain_handle().unwrap();

        // The whole body is already buffered, so one read consumes it.
        let first = body.read().await.unwrap();
        assert_eq!(&first[..], b"abcdef");
        drop(body);

        // Nothing left for the drain pass.
        assert!(drain.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn drain_handle_consumes_unread_body() {
        let (req, conn, buf) = setup(b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\nwxyz", idle_io());
        let body = for_request(&req, &conn, &buf).unwrap();
        let mut drain = body.drain_handle().unwrap();
        drop(body); // handler never read it

        assert_eq!(&drain.read().await.unwrap()[..], b"wxyz");
        assert!(drain.read().await.unwrap().is_empty());
        assert!(buf.lock().await.is_empty());
    }

    #[tokio::test]
    async fn memory_reader_has_no_drain_handle() {
        let body = BodyReader::from_bytes("x");
        assert!(body.drain_handle().is_none());
    }
}
