//! Protocol failure taxonomy.
//!
//! Every way a connection can go wrong is a [`ProtocolError`] variant
//! carrying enough context to log and, where a peer is still listening,
//! to answer with the right status code. Errors propagate by ordinary
//! `Result` returns up to the connection task, which maps any of them to
//! "abort and close".

use thiserror::Error;

use crate::http::{Method, StatusCode};

/// A connection-terminal protocol failure.
///
/// Covers framing errors (oversized head), syntax errors (malformed
/// request line or header), semantic errors (body where none is allowed,
/// unparseable length), unsupported framing strategies, and transport
/// failures. [`status`](Self::status) gives the HTTP status the failure
/// maps to.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The head grew past the configured limit without a terminator.
    #[error("request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },

    /// The request line did not have exactly three tokens.
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    /// The method token is not one of the recognized methods.
    #[error("unrecognized method: {0:?}")]
    UnknownMethod(String),

    /// The request target did not start with `/`.
    #[error("invalid request target: {0:?}")]
    InvalidTarget(String),

    /// The version token did not match `HTTP/<digits>.<digits>`.
    #[error("invalid protocol version: {0:?}")]
    InvalidVersion(String),

    /// A header line violated the field-name or field-value grammar.
    /// Carries the offending line for diagnostics.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// A body was declared on a method that forbids one.
    #[error("request body not allowed for {0}")]
    BodyNotAllowed(Method),

    /// `Content-Length` was present but not a non-negative decimal.
    #[error("invalid content length: {0:?}")]
    InvalidContentLength(String),

    /// `Transfer-Encoding: chunked` framing is not implemented.
    #[error("chunked transfer encoding is not supported")]
    ChunkedUnsupported,

    /// No length and no transfer encoding; read-until-close framing is
    /// not implemented.
    #[error("request has no declared body length")]
    UnframedBody,

    /// The transport ended inside a declared body.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// The handler returned a response the engine cannot frame.
    #[error("unframeable response: {0}")]
    InvalidResponse(&'static str),

    /// Transport-level I/O failure. Always fatal, never retried.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// The HTTP status this failure maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::HeadTooLarge { .. } => StatusCode::PayloadTooLarge,
            Self::MalformedRequestLine(_)
            | Self::InvalidTarget(_)
            | Self::InvalidVersion(_)
            | Self::MalformedHeader(_)
            | Self::BodyNotAllowed(_)
            | Self::InvalidContentLength(_)
            | Self::UnexpectedEof => StatusCode::BadRequest,
            Self::UnknownMethod(_) => StatusCode::MethodNotAllowed,
            Self::ChunkedUnsupported | Self::UnframedBody => StatusCode::NotImplemented,
            Self::InvalidResponse(_) | Self::Io(_) => StatusCode::InternalServerError,
        }
    }

    /// Returns `true` if the peer may still be able to receive an error
    /// response. Transport failures are excluded: the stream is already
    /// dead or mid-write.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ProtocolError::HeadTooLarge { limit: 8192 }.status(),
            StatusCode::PayloadTooLarge
        );
        assert_eq!(
            ProtocolError::MalformedRequestLine("GET /".into()).status(),
            StatusCode::BadRequest
        );
        assert_eq!(
            ProtocolError::UnknownMethod("FOO".into()).status(),
            StatusCode::MethodNotAllowed
        );
        assert_eq!(
            ProtocolError::ChunkedUnsupported.status(),
            StatusCode::NotImplemented
        );
        assert_eq!(
            ProtocolError::UnframedBody.status(),
            StatusCode::NotImplemented
        );
        assert_eq!(
            ProtocolError::UnexpectedEof.status(),
            StatusCode::BadRequest
        );
    }

    #[test]
    fn io_errors_are_not_reportable() {
        let err = ProtocolError::Io(std::io::Error::other("boom"));
        assert!(!err.is_reportable());
        assert!(ProtocolError::UnexpectedEof.is_reportable());
    }
}
