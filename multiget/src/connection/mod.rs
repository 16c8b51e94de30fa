//! Origin connections, SOCKS5 tunneling and connection pooling.
//!
//! A [`Connection`] owns exactly one [`Transport`] bound to one origin
//! (`host:port`). With a [`ProxyTarget`] configured the transport dials the
//! proxy and the SOCKS5 handshake runs before the connection counts as
//! connected; TLS, when the scheme asks for it, is negotiated afterwards
//! through the tunnel.
//!
//! The connection buffers inbound bytes and implements [`BufRead`], which is
//! what the HTTP response parser consumes.

mod error;
mod pool;
pub mod socks5;

pub use error::{ConnectionError, ConnectionResult, ProxyParseError};
pub use pool::{ConnectionPool, PoolGuard, DEFAULT_CONNECT_ATTEMPTS};
pub use socks5::{ProxyTarget, SocksReply};

use std::fmt;
use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;

use rustls::ClientConfig;

use crate::transport::{self, Transport};
use crate::url::{Endpoint, Scheme};

/// Size of the inbound buffer (64KB).
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A transport plus optional SOCKS5 tunneling, bound to one origin.
pub struct Connection {
    scheme: Scheme,
    host: String,
    port: u16,
    proxy: Option<ProxyTarget>,
    transport: Box<dyn Transport>,
    connected: bool,
    buffer: Vec<u8>,
    pos: usize,
    filled: usize,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("proxy", &self.proxy)
            .field("connected", &self.connected)
            .finish()
    }
}

impl Connection {
    /// Create an unconnected connection to the endpoint's origin, choosing
    /// the transport from the scheme. `https` origins are verified against
    /// `tls_config`.
    pub fn new(
        endpoint: &Endpoint,
        proxy: Option<ProxyTarget>,
        tls_config: &Arc<ClientConfig>,
    ) -> Self {
        let (dial_host, dial_port) = match &proxy {
            Some(p) => (p.address.as_str(), p.port),
            None => (endpoint.host.as_str(), endpoint.port),
        };
        let transport = transport::for_scheme(
            endpoint.scheme,
            dial_host,
            dial_port,
            &endpoint.host,
            tls_config,
        );
        Self::with_transport(endpoint, proxy, transport)
    }

    /// Create an unconnected connection over a caller-supplied transport.
    pub fn with_transport(
        endpoint: &Endpoint,
        proxy: Option<ProxyTarget>,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            scheme: endpoint.scheme,
            host: endpoint.host.clone(),
            port: endpoint.port,
            proxy,
            transport,
            connected: false,
            buffer: Vec::new(),
            pos: 0,
            filled: 0,
        }
    }

    /// Open the transport, tunnel through the proxy if any, and secure it.
    ///
    /// A no-op when already connected. On failure the transport is closed
    /// and the connection stays unconnected.
    pub fn connect(&mut self) -> ConnectionResult<()> {
        if self.connected() {
            return Ok(());
        }

        let result = self.establish();
        match &result {
            Ok(()) => {
                self.connected = true;
                self.pos = 0;
                self.filled = 0;
                tracing::debug!(host = %self.host, port = self.port, "connection established");
            }
            Err(_) => self.transport.disconnect(),
        }
        result
    }

    fn establish(&mut self) -> ConnectionResult<()> {
        self.transport.connect()?;
        if let Some(proxy) = &self.proxy {
            tracing::info!(
                proxy = %proxy,
                host = %self.host,
                port = self.port,
                "tunneling through proxy"
            );
            socks5::handshake(self.transport.as_mut(), &self.host, self.port)?;
        }
        self.transport.secure()?;
        Ok(())
    }

    /// Whether the connection is established and its transport open.
    pub fn connected(&self) -> bool {
        self.connected && self.transport.is_connected()
    }

    /// Close the transport. The connection can be reconnected later.
    pub fn disconnect(&mut self) {
        self.transport.disconnect();
        self.connected = false;
        self.pos = 0;
        self.filled = 0;
    }

    /// Write the whole buffer to the peer.
    pub fn send_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.transport.send_all(buf).map_err(io::Error::from)
    }

    pub fn proxy(&self) -> Option<&ProxyTarget> {
        self.proxy.as_ref()
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.filled && buf.len() >= READ_BUFFER_SIZE {
            return self.transport.receive(buf).map_err(io::Error::from);
        }
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for Connection {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.filled {
            if self.buffer.is_empty() {
                self.buffer = vec![0u8; READ_BUFFER_SIZE];
            }
            self.filled = self
                .transport
                .receive(&mut self.buffer)
                .map_err(io::Error::from)?;
            self.pos = 0;
        }
        Ok(&self.buffer[self.pos..self.filled])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.filled);
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.transport.send(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.transport.disconnect();
    }
}
