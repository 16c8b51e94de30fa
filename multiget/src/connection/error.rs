//! Connection and proxy error types.

use thiserror::Error;

use super::socks5::SocksReply;
use crate::transport::TransportError;

/// Result type for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Errors raised while establishing a [`Connection`](super::Connection).
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Socket or TLS failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The proxy answered the greeting with another protocol version.
    #[error("proxy server is not a SOCKS5 server (version byte {version:#04x})")]
    NotSocks5 { version: u8 },

    /// The proxy does not offer the no-authentication method.
    #[error("proxy server does not support the no-auth method (selected {method:#04x})")]
    NoAcceptableAuth { method: u8 },

    /// The proxy refused to open the tunnel.
    #[error("SOCKS5 connect failed: {0}")]
    ProxyRejected(SocksReply),

    /// The CONNECT reply carried an address type other than IPv4, domain
    /// name or IPv6.
    #[error("proxy replied with unsupported address type {0:#04x}")]
    UnsupportedAddressType(u8),

    /// Domain names in SOCKS5 requests are limited to 255 bytes.
    #[error("hostname too long for SOCKS5 request: {0} bytes")]
    HostnameTooLong(usize),
}

/// Errors from parsing a proxy specification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProxyParseError {
    /// Port part contains something other than decimal digits, or overflows.
    #[error("unsupported proxy port in {0}")]
    InvalidPort(String),
}
