//! multi-get - multi-threaded HTTP/HTTPS file downloader
//!
//! This library fetches a resource over plain TCP, TLS, or a SOCKS5 tunnel,
//! speaking HTTP/1.1 directly on the socket. When the server supports byte
//! ranges the resource is split into ranges fetched in parallel and
//! reassembled into one file.
//!
//! # Layers
//!
//! - [`transport`]: plain and TLS byte streams
//! - [`connection`]: SOCKS5 tunneling and the process-wide connection pool
//! - [`http`]: request construction and response decoding
//! - [`download`]: range partitioning, workers and reassembly

pub mod config;
pub mod connection;
pub mod download;
pub mod http;
pub mod logging;
pub mod transport;
pub mod url;

#[cfg(test)]
mod testing;

pub use config::DownloadConfig;
pub use connection::{Connection, ConnectionPool, PoolGuard, ProxyTarget};
pub use download::{DownloadError, DownloadReport, Downloader};
pub use http::{HttpClient, HttpResponse};
pub use url::{Endpoint, Scheme};
