//! Byte-stream transports.
//!
//! A [`Transport`] is a connected, ordered, reliable byte stream. Two
//! implementations exist and are selected by URL scheme:
//!
//! ```text
//! Transport (trait)
//!     ├── PlainTransport   TCP socket
//!     └── TlsTransport     TCP socket + rustls client session
//! ```
//!
//! Connecting is split in two phases so a proxy tunnel can be negotiated
//! over the raw socket before any TLS handshake:
//!
//! 1. [`Transport::connect`] resolves the dial address and opens the socket.
//! 2. [`Transport::secure`] upgrades the stream (TLS handshake). A no-op for
//!    plain transports.

mod error;
mod plain;
mod tls;

pub use error::{TransportError, TransportResult};
pub use plain::PlainTransport;
pub use tls::{default_client_config, TlsTransport};

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;

use rustls::ClientConfig;

use crate::url::Scheme;

/// Capability interface for a blocking byte stream.
pub trait Transport: Send {
    /// Resolve the dial address and open the raw socket.
    ///
    /// Calling this on an already-open transport is a no-op.
    fn connect(&mut self) -> TransportResult<()>;

    /// Finish establishing the stream once the raw socket carries traffic
    /// for the origin (directly or through a proxy tunnel).
    fn secure(&mut self) -> TransportResult<()> {
        Ok(())
    }

    /// Write some bytes, returning how many were accepted.
    fn send(&mut self, buf: &[u8]) -> TransportResult<usize>;

    /// Read into `buf`. `Ok(0)` means the peer closed the stream.
    fn receive(&mut self, buf: &mut [u8]) -> TransportResult<usize>;

    /// Close the stream. Safe to call more than once.
    fn disconnect(&mut self);

    /// Whether the socket is currently open.
    fn is_connected(&self) -> bool;

    /// Write the whole buffer, looping over short writes.
    fn send_all(&mut self, mut buf: &[u8]) -> TransportResult<()> {
        while !buf.is_empty() {
            let written = self.send(buf)?;
            if written == 0 {
                return Err(TransportError::Closed);
            }
            buf = &buf[written..];
        }
        Ok(())
    }
}

/// Build the transport matching `scheme`.
///
/// `dial_host`/`dial_port` is where the socket connects (the origin or a
/// proxy); `server_name` is the origin host used for TLS verification
/// against `tls_config`.
pub fn for_scheme(
    scheme: Scheme,
    dial_host: &str,
    dial_port: u16,
    server_name: &str,
    tls_config: &Arc<ClientConfig>,
) -> Box<dyn Transport> {
    match scheme {
        Scheme::Http => Box::new(PlainTransport::new(dial_host, dial_port)),
        Scheme::Https => Box::new(TlsTransport::with_config(
            dial_host,
            dial_port,
            server_name,
            Arc::clone(tls_config),
        )),
    }
}

/// Resolve `host:port` and connect to the first address that accepts.
pub(crate) fn open_socket(host: &str, port: u16) -> TransportResult<TcpStream> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            host: host.to_string(),
            source,
        })?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                tracing::debug!(host, port, %addr, "socket connected");
                return Ok(stream);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(match last_error {
        Some(source) => TransportError::Connect {
            host: host.to_string(),
            port,
            source,
        },
        None => TransportError::NoAddress {
            host: host.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_open_socket_reaches_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = open_socket("127.0.0.1", port).unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }

    #[test]
    fn test_open_socket_refused() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = open_socket("127.0.0.1", port).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[test]
    fn test_for_scheme_starts_disconnected() {
        let config = default_client_config();
        let plain = for_scheme(Scheme::Http, "127.0.0.1", 80, "127.0.0.1", &config);
        let tls = for_scheme(Scheme::Https, "127.0.0.1", 443, "localhost", &config);
        assert!(!plain.is_connected());
        assert!(!tls.is_connected());
    }
}
