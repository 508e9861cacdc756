//! Async TCP server and per-connection engine using Tokio.
//!
//! [`Server`] accepts TCP connections and spawns one task per connection.
//! Each task runs [`serve_connection`]: frame one request head out of the
//! receive buffer, build its body reader, invoke the handler, write the
//! framed response, then either drain the unread body and loop
//! (keep-alive) or close. `serve_connection` is public so the engine can
//! be driven over any transport — including an in-memory duplex in tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::body::{self, BodyReader};
use crate::buffer::RecvBuffer;
use crate::config::ServerConfig;
use crate::conn::{Connection, Transport};
use crate::error::ProtocolError;
use crate::http::{Request, Response, request};

/// Errors produced by the server's listener.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// The filament HTTP server.
///
/// Binds to a TCP address and dispatches each framed request, together
/// with its lazy body reader, to a handler function.
///
/// # Examples
///
/// ```rust,no_run
/// use filament::server::Server;
/// use filament::http::{Response, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind("127.0.0.1:8080").await?;
///     println!("Listening on http://127.0.0.1:8080");
///     server.run(|_req, _body| async {
///         Response::new(StatusCode::Ok).body("hello world.\n")
///     }).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
}

impl Server {
    /// Binds the server to the given TCP address with default limits.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        Self::bind_with_config(addr, ServerConfig::default()).await
    }

    /// Binds with explicit [`ServerConfig`] limits.
    pub async fn bind_with_config(
        addr: impl AsRef<str>,
        config: ServerConfig,
    ) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            config,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections and dispatching requests to `handler`.
    ///
    /// The handler receives each parsed [`Request`] and sole ownership of
    /// its [`BodyReader`], and must return a [`Future`] resolving to a
    /// [`Response`]. It is wrapped in an [`Arc`] and shared across all
    /// spawned Tokio tasks, so it must be `Send + Sync + 'static`.
    ///
    /// This method runs until the process is terminated or an
    /// unrecoverable listener error occurs.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request, BodyReader) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "filament listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);
            let config = self.config;

            tokio::spawn(async move {
                match serve_connection(stream, config, handler).await {
                    Ok(()) => debug!(peer = %peer_addr, "connection closed"),
                    Err(e) => warn!(peer = %peer_addr, error = %e, "connection closed with error"),
                }
            });
        }
    }
}

/// Drives one connection over its whole lifetime.
///
/// Loops over request/response cycles until the transport ends cleanly,
/// a protocol or transport error aborts the connection, or the request
/// forbids reuse (HTTP/1.0, or a `Connection: close` token). Before
/// reusing the connection, any part of the request body the handler left
/// unread is drained so the next head starts at a clean boundary.
///
/// When a protocol error occurs before any response byte was written for
/// the failing request, a terse error response is written on a
/// best-effort basis; the error is returned either way.
///
/// # Errors
///
/// The [`ProtocolError`] that aborted the connection. A clean end of
/// stream — even one cutting off a partially received head — is `Ok`.
pub async fn serve_connection<H, F>(
    io: impl Transport + 'static,
    config: ServerConfig,
    handler: Arc<H>,
) -> Result<(), ProtocolError>
where
    H: Fn(Request, BodyReader) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send,
{
    let conn = Arc::new(Mutex::new(Connection::new(io, config.read_chunk_bytes)));
    let buf = Arc::new(Mutex::new(RecvBuffer::new()));

    loop {
        let req = match next_request(&conn, &buf, &config).await {
            Ok(Some(req)) => req,
            Ok(None) => return Ok(()),
            Err(e) => return abort(&conn, e).await,
        };

        let keep_alive = req.is_keep_alive();
        let req_body = match body::for_request(&req, &conn, &buf) {
            Ok(b) => b,
            Err(e) => return abort(&conn, e).await,
        };
        let drain = req_body.drain_handle();

        debug!(method = %req.method(), target = %req.target(), "dispatching request");
        let response = handler(req, req_body).await;

        if let Err(e) = write_response(&conn, response).await {
            if matches!(e, ProtocolError::InvalidResponse(_)) {
                // Caught before any byte went out, so the peer can still
                // be told the failure is ours.
                return abort(&conn, e).await;
            }
            return Err(e);
        }

        if !keep_alive {
            debug!("connection not reusable — closing");
            return Ok(());
        }

        if let Some(mut drain) = drain {
            while !drain.read().await?.is_empty() {}
        }
    }
}

/// Frames the next request head, reading from the transport as needed.
///
/// `Ok(None)` means the peer ended the stream cleanly between (or, for a
/// partial head, within) messages.
async fn next_request(
    conn: &Arc<Mutex<Connection>>,
    buf: &Arc<Mutex<RecvBuffer>>,
    config: &ServerConfig,
) -> Result<Option<Request>, ProtocolError> {
    loop {
        if let Some(req) = request::try_parse(&mut buf.lock().await, config.max_head_bytes)? {
            return Ok(Some(req));
        }
        let chunk = conn.lock().await.read_chunk().await?;
        if chunk.is_empty() {
            let leftover = buf.lock().await.len();
            if leftover > 0 {
                debug!(leftover, "peer closed with a partial head buffered");
            }
            return Ok(None);
        }
        buf.lock().await.append(&chunk);
    }
}

/// Serializes and transmits one response.
///
/// The head is written as status line, every stored header line verbatim,
/// then the computed `Content-Length` and a blank line; the body follows
/// chunk by chunk until its reader reports end-of-body.
async fn write_response(
    conn: &Arc<Mutex<Connection>>,
    response: Response,
) -> Result<(), ProtocolError> {
    let (status, headers, mut body) = response.into_parts();
    if headers.contains("content-length") {
        return Err(ProtocolError::InvalidResponse(
            "handler must not set Content-Length",
        ));
    }
    let length = body.len().ok_or(ProtocolError::InvalidResponse(
        "a body of unknown length cannot be framed",
    ))?;

    let mut head = BytesMut::with_capacity(128 + headers.len() * 64);
    head.extend_from_slice(
        format!("HTTP/1.1 {} {}\r\n", status.as_u16(), status.canonical_reason()).as_bytes(),
    );
    for line in headers.lines() {
        head.extend_from_slice(line);
        head.extend_from_slice(b"\r\n");
    }
    head.extend_from_slice(format!("Content-Length: {length}\r\n").as_bytes());
    head.extend_from_slice(b"\r\n");
    conn.lock().await.write_all(&head).await?;

    loop {
        let chunk = body.read().await?;
        if chunk.is_empty() {
            break;
        }
        conn.lock().await.write_all(&chunk).await?;
    }
    conn.lock().await.flush().await?;
    Ok(())
}

/// Best-effort error report, then the error itself. Transport failures
/// skip the report: the stream is already unusable.
async fn abort(conn: &Arc<Mutex<Connection>>, err: ProtocolError) -> Result<(), ProtocolError> {
    if err.is_reportable() {
        let response = Response::new(err.status()).body(format!("{err}\n").into_bytes());
        let _ = write_response(conn, response).await;
    }
    Err(err)
}
