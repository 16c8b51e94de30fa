//! HTTP client error types.

use std::io;

use thiserror::Error;

use crate::url::UrlError;

/// Result type for HTTP operations.
pub type HttpResult<T> = Result<T, HttpError>;

/// Errors raised by the HTTP client and response parser.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request URL could not be parsed.
    #[error(transparent)]
    Url(#[from] UrlError),

    /// No connection to the origin could be established.
    #[error("unable to connect to {origin}")]
    Connect { origin: String },

    /// The peer closed the connection before sending any response bytes.
    #[error("connection closed before a response was received")]
    NoResponse,

    /// The peer closed the connection inside the header section.
    #[error("connection closed inside the response header section")]
    IncompleteHead,

    /// The status line could not be parsed.
    #[error("malformed status line: {0:?}")]
    MalformedStatusLine(String),

    /// The body ended before its framing said it would.
    #[error("response body truncated: expected {expected} bytes, received {received}")]
    TruncatedBody { expected: u64, received: u64 },

    /// A chunk size does not fit in 64 bits.
    #[error("chunk size overflows")]
    ChunkSizeOverflow,

    /// Redirect chain exceeded the configured limit.
    #[error("too many redirects (limit {limit})")]
    TooManyRedirects { limit: usize },

    /// I/O error while sending the request or reading the response.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl HttpError {
    /// Whether the error means the connection was dead before the request
    /// got an answer, so the request may be replayed on a new connection.
    pub(crate) fn is_stale_connection(&self) -> bool {
        match self {
            HttpError::NoResponse => true,
            HttpError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
