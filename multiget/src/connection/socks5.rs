//! SOCKS5 client handshake (RFC 1928, no authentication, CONNECT by name).
//!
//! Wire exchange after the transport reaches the proxy:
//!
//! ```text
//! client  05 01 00                              greeting: v5, 1 method, no-auth
//! proxy   05 00                                 method selected
//! client  05 01 00 03 <len> <host..> <port:be16> CONNECT, domain name
//! proxy   05 <rep> 00 <atyp> <bound addr> <port>
//! ```

use std::fmt;

use thiserror::Error;

use super::error::{ConnectionError, ConnectionResult, ProxyParseError};
use crate::transport::{Transport, TransportError};

const SOCKS_VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

const PROXY_PREFIX: &str = "socks5://";

/// SOCKS5 proxy address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    pub address: String,
    pub port: u16,
}

impl ProxyTarget {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Parse a `socks5://host:port` proxy string.
    ///
    /// Anything that is not a `socks5://` URL, or lacks a host or a non-zero
    /// port, yields `Ok(None)`: proxying is silently disabled. A port with
    /// non-digit characters is an error.
    pub fn parse(spec: &str) -> Result<Option<Self>, ProxyParseError> {
        let Some(rest) = spec.trim().strip_prefix(PROXY_PREFIX) else {
            return Ok(None);
        };
        let rest = rest.trim_end_matches('/');
        let Some((address, port)) = rest.split_once(':') else {
            return Ok(None);
        };

        if !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProxyParseError::InvalidPort(spec.to_string()));
        }
        let port = if port.is_empty() {
            0
        } else {
            port.parse::<u16>()
                .map_err(|_| ProxyParseError::InvalidPort(spec.to_string()))?
        };

        if address.is_empty() || port == 0 {
            return Ok(None);
        }
        Ok(Some(Self::new(address, port)))
    }
}

impl fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}", PROXY_PREFIX, self.address, self.port)
    }
}

/// Non-success reply codes of a SOCKS5 CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SocksReply {
    #[error("general SOCKS server failure")]
    GeneralFailure,
    #[error("connection not allowed by ruleset")]
    NotAllowed,
    #[error("network unreachable")]
    NetworkUnreachable,
    #[error("host unreachable")]
    HostUnreachable,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("TTL expired")]
    TtlExpired,
    #[error("command not supported")]
    CommandNotSupported,
    #[error("address type not supported")]
    AddressTypeNotSupported,
    #[error("unknown SOCKS failure (reply code {0:#04x})")]
    Unknown(u8),
}

impl SocksReply {
    /// Map a reply code; `None` for `0x00` (succeeded).
    pub fn from_code(code: u8) -> Option<Self> {
        let reply = match code {
            0x00 => return None,
            0x01 => Self::GeneralFailure,
            0x02 => Self::NotAllowed,
            0x03 => Self::NetworkUnreachable,
            0x04 => Self::HostUnreachable,
            0x05 => Self::ConnectionRefused,
            0x06 => Self::TtlExpired,
            0x07 => Self::CommandNotSupported,
            0x08 => Self::AddressTypeNotSupported,
            other => Self::Unknown(other),
        };
        Some(reply)
    }
}

/// Build the CONNECT request for `host:port` using the domain-name address type.
pub fn connect_request(host: &str, port: u16) -> ConnectionResult<Vec<u8>> {
    let name = host.as_bytes();
    let len = u8::try_from(name.len()).map_err(|_| ConnectionError::HostnameTooLong(name.len()))?;

    let mut request = Vec::with_capacity(7 + name.len());
    request.extend_from_slice(&[SOCKS_VERSION, CMD_CONNECT, 0x00, ATYP_DOMAIN, len]);
    request.extend_from_slice(name);
    request.extend_from_slice(&port.to_be_bytes());
    Ok(request)
}

/// Run the client handshake over a transport already connected to the proxy.
///
/// On success the transport carries traffic for `host:port`.
pub fn handshake(transport: &mut dyn Transport, host: &str, port: u16) -> ConnectionResult<()> {
    transport.send_all(&[SOCKS_VERSION, 0x01, METHOD_NO_AUTH])?;

    let mut selection = [0u8; 2];
    receive_exact(transport, &mut selection)?;
    if selection[0] != SOCKS_VERSION {
        return Err(ConnectionError::NotSocks5 {
            version: selection[0],
        });
    }
    if selection[1] != METHOD_NO_AUTH {
        return Err(ConnectionError::NoAcceptableAuth {
            method: selection[1],
        });
    }

    transport.send_all(&connect_request(host, port)?)?;

    // VER REP first, so a short failure reply is still reported by reason.
    let mut reply = [0u8; 2];
    receive_exact(transport, &mut reply)?;
    if reply[0] != SOCKS_VERSION {
        return Err(ConnectionError::NotSocks5 { version: reply[0] });
    }
    if let Some(failure) = SocksReply::from_code(reply[1]) {
        return Err(ConnectionError::ProxyRejected(failure));
    }

    // RSV ATYP, then the bound address which is of no use to us.
    let mut tail = [0u8; 2];
    receive_exact(transport, &mut tail)?;
    let bound_len = match tail[1] {
        ATYP_IPV4 => 4 + 2,
        ATYP_IPV6 => 16 + 2,
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            receive_exact(transport, &mut len)?;
            len[0] as usize + 2
        }
        other => return Err(ConnectionError::UnsupportedAddressType(other)),
    };
    let mut bound = vec![0u8; bound_len];
    receive_exact(transport, &mut bound)?;

    Ok(())
}

fn receive_exact(transport: &mut dyn Transport, mut buf: &mut [u8]) -> ConnectionResult<()> {
    while !buf.is_empty() {
        let read = transport.receive(buf)?;
        if read == 0 {
            return Err(TransportError::Closed.into());
        }
        buf = &mut buf[read..];
    }
    Ok(())
}
