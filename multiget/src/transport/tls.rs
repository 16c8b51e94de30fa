//! TLS transport backed by rustls.
//!
//! The socket is opened first and only upgraded in [`Transport::secure`],
//! which lets a SOCKS5 tunnel be negotiated in clear text beforehand.
//! Until the upgrade, `send`/`receive` operate on the raw socket.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, OnceLock};

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use super::{open_socket, Transport, TransportError, TransportResult};

enum TlsState {
    Closed,
    Raw(TcpStream),
    Secure(Box<StreamOwned<ClientConnection, TcpStream>>),
}

/// TLS-secured TCP byte stream.
pub struct TlsTransport {
    host: String,
    port: u16,
    server_name: String,
    config: Arc<ClientConfig>,
    state: TlsState,
}

impl std::fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            TlsState::Closed => "closed",
            TlsState::Raw(_) => "raw",
            TlsState::Secure(_) => "secure",
        };
        f.debug_struct("TlsTransport")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("server_name", &self.server_name)
            .field("state", &state)
            .finish()
    }
}

/// Shared client configuration trusting the Mozilla root set.
pub fn default_client_config() -> Arc<ClientConfig> {
    static CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();
    CONFIG
        .get_or_init(|| {
            let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            Arc::new(
                ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth(),
            )
        })
        .clone()
}

impl TlsTransport {
    /// Create a transport dialing `host:port` and verifying the peer as
    /// `server_name`.
    pub fn new(host: &str, port: u16, server_name: &str) -> Self {
        Self::with_config(host, port, server_name, default_client_config())
    }

    /// Like [`new`](Self::new), verifying the peer against `config` instead
    /// of the Mozilla roots.
    pub fn with_config(
        host: &str,
        port: u16,
        server_name: &str,
        config: Arc<ClientConfig>,
    ) -> Self {
        Self {
            host: host.to_string(),
            port,
            server_name: server_name.to_string(),
            config,
            state: TlsState::Closed,
        }
    }

    /// Whether the TLS handshake has completed.
    pub fn is_secure(&self) -> bool {
        matches!(self.state, TlsState::Secure(_))
    }

    fn handshake(
        &self,
        socket: TcpStream,
    ) -> TransportResult<StreamOwned<ClientConnection, TcpStream>> {
        let name = ServerName::try_from(self.server_name.clone())
            .map_err(|_| TransportError::InvalidServerName(self.server_name.clone()))?;
        let session = ClientConnection::new(Arc::clone(&self.config), name).map_err(|e| {
            TransportError::Handshake {
                host: self.server_name.clone(),
                source: io::Error::other(e),
            }
        })?;

        let mut stream = StreamOwned::new(session, socket);
        while stream.conn.is_handshaking() {
            stream
                .conn
                .complete_io(&mut stream.sock)
                .map_err(|source| TransportError::Handshake {
                    host: self.server_name.clone(),
                    source,
                })?;
        }
        Ok(stream)
    }
}

impl Transport for TlsTransport {
    fn connect(&mut self) -> TransportResult<()> {
        if matches!(self.state, TlsState::Closed) {
            self.state = TlsState::Raw(open_socket(&self.host, self.port)?);
        }
        Ok(())
    }

    fn secure(&mut self) -> TransportResult<()> {
        if self.is_secure() {
            return Ok(());
        }
        let TlsState::Raw(socket) = std::mem::replace(&mut self.state, TlsState::Closed) else {
            return Err(TransportError::NotConnected);
        };

        let stream = self.handshake(socket)?;
        tracing::debug!(
            server = %self.server_name,
            version = ?stream.conn.protocol_version(),
            "TLS session established"
        );
        self.state = TlsState::Secure(Box::new(stream));
        Ok(())
    }

    fn send(&mut self, buf: &[u8]) -> TransportResult<usize> {
        match &mut self.state {
            TlsState::Closed => Err(TransportError::NotConnected),
            TlsState::Raw(socket) => Ok(socket.write(buf)?),
            TlsState::Secure(stream) => {
                let written = stream.write(buf)?;
                stream.flush()?;
                Ok(written)
            }
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        match &mut self.state {
            TlsState::Closed => Err(TransportError::NotConnected),
            TlsState::Raw(socket) => Ok(socket.read(buf)?),
            TlsState::Secure(stream) => match stream.read(buf) {
                Ok(n) => Ok(n),
                // Peers that drop the socket without close_notify.
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
                Err(e) => Err(e.into()),
            },
        }
    }

    fn disconnect(&mut self) {
        match std::mem::replace(&mut self.state, TlsState::Closed) {
            TlsState::Closed => {}
            TlsState::Raw(socket) => {
                let _ = socket.shutdown(Shutdown::Both);
            }
            TlsState::Secure(mut stream) => {
                stream.conn.send_close_notify();
                let _ = stream.conn.complete_io(&mut stream.sock);
                let _ = stream.sock.shutdown(Shutdown::Both);
            }
        }
    }

    fn is_connected(&self) -> bool {
        !matches!(self.state, TlsState::Closed)
    }
}

impl Drop for TlsTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
