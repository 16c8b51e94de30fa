//! Plain TCP transport.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};

use super::{open_socket, Transport, TransportError, TransportResult};

/// Unencrypted TCP byte stream.
#[derive(Debug)]
pub struct PlainTransport {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
}

impl PlainTransport {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            stream: None,
        }
    }
}

impl Transport for PlainTransport {
    fn connect(&mut self) -> TransportResult<()> {
        if self.stream.is_none() {
            self.stream = Some(open_socket(&self.host, self.port)?);
        }
        Ok(())
    }

    fn send(&mut self, buf: &[u8]) -> TransportResult<usize> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        Ok(stream.write(buf)?)
    }

    fn receive(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        Ok(stream.read(buf)?)
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for PlainTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
