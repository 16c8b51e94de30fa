//! Shared test fixtures: an in-memory scripted transport and a local
//! HTTP(S) server running on a background thread.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig, ServerConnection, StreamOwned};

use crate::transport::{Transport, TransportError, TransportResult};

/// What a [`ScriptedTransport`] observed.
#[derive(Debug, Default)]
pub struct TransportLog {
    connects: AtomicUsize,
    sent: Mutex<Vec<u8>>,
}

impl TransportLog {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<u8> {
        self.sent.lock().clone()
    }
}

/// Transport replaying canned inbound bytes, optionally in small pieces to
/// exercise short reads.
pub struct ScriptedTransport {
    log: Arc<TransportLog>,
    inbound: VecDeque<u8>,
    max_chunk: usize,
    open: bool,
}

impl ScriptedTransport {
    pub fn new(inbound: &[u8]) -> (Self, Arc<TransportLog>) {
        let log = Arc::new(TransportLog::default());
        let transport = Self {
            log: Arc::clone(&log),
            inbound: inbound.iter().copied().collect(),
            max_chunk: usize::MAX,
            open: false,
        };
        (transport, log)
    }

    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk.max(1);
        self
    }

    /// Inbound bytes not yet received.
    pub fn remaining(&self) -> usize {
        self.inbound.len()
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self) -> TransportResult<()> {
        if !self.open {
            self.log.connects.fetch_add(1, Ordering::SeqCst);
            self.open = true;
        }
        Ok(())
    }

    fn send(&mut self, buf: &[u8]) -> TransportResult<usize> {
        if !self.open {
            return Err(TransportError::NotConnected);
        }
        self.log.sent.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn receive(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        if !self.open {
            return Err(TransportError::NotConnected);
        }
        let n = buf.len().min(self.max_chunk).min(self.inbound.len());
        for slot in buf.iter_mut().take(n) {
            if let Some(byte) = self.inbound.pop_front() {
                *slot = byte;
            }
        }
        Ok(n)
    }

    fn disconnect(&mut self) {
        self.open = false;
    }

    fn is_connected(&self) -> bool {
        self.open
    }
}

/// Response produced by a [`TestServer`] handler.
pub struct Reply {
    pub bytes: Vec<u8>,
    /// Close the socket after writing the reply.
    pub close: bool,
}

impl Reply {
    pub fn keep_alive(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            close: false,
        }
    }

    pub fn close(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            close: true,
        }
    }
}

type Handler = dyn Fn(&str) -> Reply + Send + Sync;

/// Self-signed certificate for `localhost` and `127.0.0.1`, with a server
/// configuration presenting it and a client configuration trusting only it.
pub struct TestCertificate {
    pub server: Arc<ServerConfig>,
    pub client: Arc<ClientConfig>,
}

impl TestCertificate {
    pub fn generate() -> Self {
        let names = vec!["localhost".to_string(), "127.0.0.1".to_string()];
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(names).unwrap();
        let cert_der: CertificateDer<'static> = cert.der().clone();
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

        let server = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der.clone()], key_der)
            .unwrap();

        let mut roots = RootCertStore::empty();
        roots.add(cert_der).unwrap();
        let client = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        Self {
            server: Arc::new(server),
            client: Arc::new(client),
        }
    }
}

/// Minimal keep-alive HTTP server on `127.0.0.1`.
///
/// Each accepted socket is served on its own thread; request heads are
/// handed to the handler and recorded. A TLS server drops the socket
/// without `close_notify` when a reply asks to close.
pub struct TestServer {
    pub port: u16,
    scheme: &'static str,
    accepted: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        Self::spawn(None, handler)
    }

    /// Serve HTTPS with `certificate`.
    pub fn start_tls<F>(certificate: &TestCertificate, handler: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        Self::spawn(Some(Arc::clone(&certificate.server)), handler)
    }

    fn spawn<F>(tls: Option<Arc<ServerConfig>>, handler: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);
        let scheme = if tls.is_some() { "https" } else { "http" };

        {
            let accepted = Arc::clone(&accepted);
            let requests = Arc::clone(&requests);
            thread::spawn(move || {
                for socket in listener.incoming().flatten() {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    let handler = Arc::clone(&handler);
                    let requests = Arc::clone(&requests);
                    let tls = tls.clone();
                    thread::spawn(move || match tls {
                        Some(config) => {
                            let Ok(session) = ServerConnection::new(config) else {
                                return;
                            };
                            serve(StreamOwned::new(session, socket), handler, requests)
                        }
                        None => serve(socket, handler, requests),
                    });
                }
            });
        }

        Self {
            port,
            scheme,
            accepted,
            requests,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}://127.0.0.1:{}{}", self.scheme, self.port, path)
    }

    /// Number of TCP connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

fn serve<S: Read + Write>(
    mut socket: S,
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<String>>>,
) {
    loop {
        let Some(head) = read_request_head(&mut socket) else {
            return;
        };
        requests.lock().push(head.clone());
        let reply = handler(&head);
        if socket.write_all(&reply.bytes).is_err() || socket.flush().is_err() || reply.close {
            return;
        }
    }
}

fn read_request_head<S: Read>(socket: &mut S) -> Option<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match socket.read(&mut byte) {
            Ok(1) => head.push(byte[0]),
            _ => return None,
        }
    }
    Some(String::from_utf8_lossy(&head).into_owned())
}

/// Value of `name` in a raw request head.
pub fn request_header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

/// `200 OK` response with a Content-Length body.
pub fn ok_response(body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nAccept-Ranges: bytes\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}
