//! # filament
//!
//! A from-scratch async HTTP/1.1 framing engine and connection core
//! written in Rust. No HTTP library underneath: filament locates message
//! boundaries in the raw byte stream itself, parses request heads,
//! streams bodies lazily through per-connection buffers, and drives
//! persistent (keep-alive) request/response cycles — one independent
//! task per connection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use filament::server::Server;
//! use filament::http::{Response, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     println!("Listening on http://127.0.0.1:8080");
//!     server.run(|_req, _body| async {
//!         Response::new(StatusCode::Ok).body("hello world.\n")
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod body;
pub mod buffer;
pub mod config;
pub mod conn;
pub mod error;
pub mod http;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use body::BodyReader;
pub use config::ServerConfig;
pub use error::ProtocolError;
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use server::{Server, ServerError};
