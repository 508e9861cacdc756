//! HTTP/1.1 response builder.
//!
//! Provides a fluent builder API for constructing responses. A response
//! carries its body as a [`BodyReader`], so a handler can answer with an
//! in-memory payload or stream a request body straight back out. The
//! `Content-Length` header is computed and written by the connection
//! engine during serialization — a response must not set its own.

use serde::Serialize;

use crate::body::BodyReader;

use super::{Headers, StatusCode};

/// An HTTP/1.1 response, ready to be framed and sent.
///
/// # Examples
///
/// ```
/// use filament::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("Content-Type", "text/plain; charset=utf-8")
///     .body("Hello, World!");
///
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert_eq!(response.body_ref().len(), Some(13));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: BodyReader,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: BodyReader::empty(),
        }
    }

    /// Appends a response header. Multiple calls with the same name are
    /// additive. Do not set `Content-Length` — the engine frames the body.
    #[must_use]
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place, for code that receives a `Response` and
    /// needs to decorate it without consuming it.
    pub fn add_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) {
        self.headers.insert(name, value);
    }

    /// Sets the response body from in-memory bytes.
    #[must_use]
    pub fn body(mut self, body: impl Into<bytes::Bytes>) -> Self {
        self.body = BodyReader::from_bytes(body.into());
        self
    }

    /// Sets the response body from an existing reader — e.g. a request's
    /// [`BodyReader`] to echo it back without buffering.
    #[must_use]
    pub fn body_reader(mut self, body: BodyReader) -> Self {
        self.body = body;
        self
    }

    /// Serializes `value` as the JSON body and sets the content type.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if `value` cannot be
    /// serialized.
    pub fn json<T: Serialize>(self, value: &T) -> Result<Self, serde_json::Error> {
        let data = serde_json::to_vec(value)?;
        Ok(self
            .header("Content-Type", "application/json")
            .body(data))
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the response body reader.
    pub fn body_ref(&self) -> &BodyReader {
        &self.body
    }

    /// Decomposes the response for serialization.
    pub fn into_parts(self) -> (StatusCode, Headers, BodyReader) {
        (self.status, self.headers, self.body)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}
