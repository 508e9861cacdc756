//! Incremental HTTP/1.1 request framing and head parsing.
//!
//! The transport delivers bytes in arbitrary chunks, so a complete request
//! head may arrive in one read or across dozens. [`try_parse`] scans the
//! receive buffer for the `\r\n\r\n` terminator and either produces one
//! parsed [`Request`], asks for more data, or rejects the head. Bytes
//! belonging to the body — or to a pipelined next request — are left in
//! the buffer untouched.

use bytes::Bytes;

use crate::buffer::RecvBuffer;
use crate::error::ProtocolError;

use super::{Headers, Method};

/// The four-byte sequence that ends a request head.
const TERMINATOR: &[u8] = b"\r\n\r\n";

/// A fully parsed request head. Immutable once constructed.
///
/// The body is not part of the request: it is consumed lazily through a
/// [`BodyReader`](crate::body::BodyReader) built from these headers.
///
/// # Examples
///
/// ```
/// use filament::buffer::RecvBuffer;
/// use filament::http::{Method, request};
///
/// let mut buf = RecvBuffer::new();
/// buf.append(b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\n\r\n");
/// let req = request::try_parse(&mut buf, 8192).unwrap().unwrap();
///
/// assert_eq!(req.method(), Method::Get);
/// assert_eq!(req.path(), "/hello");
/// assert_eq!(req.query(), Some("name=world"));
/// assert_eq!(req.version(), "1.1");
/// assert_eq!(req.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    target: String,
    /// The `<major>.<minor>` part of the version token, e.g. `"1.1"`.
    version: String,
    headers: Headers,
}

/// Attempts to extract one complete request head from the buffer.
///
/// Returns `Ok(None)` when the terminator has not arrived yet and the
/// buffer is still within `max_head_bytes`. On success the head's bytes
/// (terminator included) have been consumed from the buffer; everything
/// after them — body bytes, pipelined requests — remains for the caller.
///
/// # Errors
///
/// - [`ProtocolError::HeadTooLarge`] — `max_head_bytes` or more are
///   buffered with no terminator in sight.
/// - Any syntax error from the request line or a header line; the buffer
///   state is unspecified afterwards and the connection must be closed.
pub fn try_parse(
    buf: &mut RecvBuffer,
    max_head_bytes: usize,
) -> Result<Option<Request>, ProtocolError> {
    let Some(at) = find_terminator(buf.as_slice()) else {
        if buf.len() >= max_head_bytes {
            return Err(ProtocolError::HeadTooLarge {
                limit: max_head_bytes,
            });
        }
        return Ok(None);
    };
    let head = buf.split_to(at + TERMINATOR.len());
    parse_head(head).map(Some)
}

/// Returns the offset of the first head terminator, if any.
fn find_terminator(haystack: &[u8]) -> Option<usize> {
    if haystack.len() < TERMINATOR.len() {
        return None;
    }
    haystack.windows(TERMINATOR.len()).position(|w| w == TERMINATOR)
}

/// Parses one head block (terminator included) into a [`Request`].
fn parse_head(head: Bytes) -> Result<Request, ProtocolError> {
    let block = &head[..head.len() - TERMINATOR.len()];

    // Lines end at LF with an optional preceding CR; a bare LF is
    // tolerated. The block has no trailing LF, so the last range runs to
    // its end.
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, &b) in block.iter().enumerate() {
        if b == b'\n' {
            let end = if i > start && block[i - 1] == b'\r' { i - 1 } else { i };
            lines.push(start..end);
            start = i + 1;
        }
    }
    lines.push(start..block.len());
    if lines.len() > 1 && lines.last().is_some_and(|r| r.is_empty()) {
        lines.pop();
    }

    let mut ranges = lines.into_iter();
    let request_line = ranges.next().unwrap_or(0..0);
    let (method, target, version) = parse_request_line(&block[request_line])?;

    let mut headers = Headers::new();
    for range in ranges {
        validate_header_line(&block[range.clone()])?;
        headers.push_raw_line(head.slice(range));
    }

    Ok(Request {
        method,
        target,
        version,
        headers,
    })
}

/// Parses `<METHOD> <target> HTTP/<major>.<minor>`.
fn parse_request_line(line: &[u8]) -> Result<(Method, String, String), ProtocolError> {
    let malformed = || ProtocolError::MalformedRequestLine(String::from_utf8_lossy(line).into_owned());

    let line = std::str::from_utf8(line).map_err(|_| malformed())?;
    let mut tokens = line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(malformed());
    };
    if method.is_empty() || target.is_empty() || version.is_empty() {
        return Err(malformed());
    }

    let method =
        Method::from_token(method).ok_or_else(|| ProtocolError::UnknownMethod(method.to_owned()))?;
    if !target.starts_with('/') {
        return Err(ProtocolError::InvalidTarget(target.to_owned()));
    }
    let version = parse_version(version)?;

    Ok((method, target.to_owned(), version))
}

/// Accepts `HTTP/<digit>+.<digit>+`, returning the `<major>.<minor>` part.
fn parse_version(token: &str) -> Result<String, ProtocolError> {
    let invalid = || ProtocolError::InvalidVersion(token.to_owned());

    let rest = token.strip_prefix("HTTP/").ok_or_else(invalid)?;
    let (major, minor) = rest.split_once('.').ok_or_else(invalid)?;
    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(major) || !is_digits(minor) {
        return Err(invalid());
    }
    Ok(rest.to_owned())
}

/// RFC 9110 `tchar`: the bytes allowed in a field name.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// A field value may contain HTAB, printable ASCII, and obs-text
/// (0x80–0xFF); all other control bytes are rejected.
fn is_value_byte(b: u8) -> bool {
    b == b'\t' || (0x20..=0x7e).contains(&b) || b >= 0x80
}

/// Checks one raw header line against the field grammar. The offending
/// line is echoed in the error for diagnostics.
fn validate_header_line(line: &[u8]) -> Result<(), ProtocolError> {
    let malformed = || ProtocolError::MalformedHeader(String::from_utf8_lossy(line).into_owned());

    let colon = line.iter().position(|&b| b == b':').ok_or_else(malformed)?;
    let (name, value) = (&line[..colon], &line[colon + 1..]);
    if name.is_empty() || !name.iter().copied().all(is_token_byte) {
        return Err(malformed());
    }
    if !value.iter().copied().all(is_value_byte) {
        return Err(malformed());
    }
    Ok(())
}

impl Request {
    /// Returns the HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the raw request target, query string included.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the request path (the target without the query string).
    pub fn path(&self) -> &str {
        match self.target.find('?') {
            Some(pos) => &self.target[..pos],
            None => &self.target,
        }
    }

    /// Returns the query string (without the leading `?`), if any.
    pub fn query(&self) -> Option<&str> {
        self.target.find('?').map(|pos| &self.target[pos + 1..])
    }

    /// Returns the protocol version as `<major>.<minor>`, e.g. `"1.1"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns `true` if the connection may be reused after this request.
    ///
    /// HTTP/1.0 connections always close — an explicit `keep-alive` token
    /// does not override that. Later versions persist unless any
    /// `Connection` header carries a `close` token.
    pub fn is_keep_alive(&self) -> bool {
        if self.version == "1.0" {
            return false;
        }
        !self
            .headers
            .get_all("connection")
            .any(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case("close")))
    }
}
