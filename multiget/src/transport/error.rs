//! Transport error types.

use std::io;

use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised by a [`Transport`](super::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// Hostname resolution failed.
    #[error("failed to resolve {host}: {source}")]
    Resolve { host: String, source: io::Error },

    /// Resolution returned no addresses.
    #[error("no addresses found for {host}")]
    NoAddress { host: String },

    /// Every resolved address refused the connection.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        source: io::Error,
    },

    /// The host is not a valid TLS server name.
    #[error("invalid TLS server name: {0}")]
    InvalidServerName(String),

    /// The TLS handshake did not complete.
    #[error("TLS handshake with {host} failed: {source}")]
    Handshake { host: String, source: io::Error },

    /// Send or receive on a transport that is not connected.
    #[error("transport is not connected")]
    NotConnected,

    /// The peer stopped accepting data.
    #[error("connection closed by peer")]
    Closed,

    /// I/O error on an established stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<TransportError> for io::Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(e) => e,
            TransportError::Closed => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            other => io::Error::other(other),
        }
    }
}
