//! Configuration for a download run.

use std::path::PathBuf;

use crate::connection::{ProxyTarget, DEFAULT_CONNECT_ATTEMPTS};
use crate::http::DEFAULT_MAX_REDIRECTS;

/// Worker threads used when none are requested.
pub const DEFAULT_THREADS: usize = 4;

/// Upper bound on worker threads.
pub const MAX_THREADS: usize = 32;

/// Log file written by the command-line tool.
pub const DEFAULT_LOG_FILE: &str = "multi-get.log";

/// Configuration for one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Resource to fetch.
    pub url: String,

    /// Requested worker threads. Clamped to `1..=MAX_THREADS` when used.
    pub threads: usize,

    /// SOCKS5 proxy for all connections, if any.
    pub proxy: Option<ProxyTarget>,

    /// Directory the output file is written to.
    pub output_dir: PathBuf,

    /// Redirects followed per request.
    pub max_redirects: usize,

    /// Attempts made when opening a new connection.
    pub connect_attempts: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl DownloadConfig {
    /// Create a configuration for `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            threads: DEFAULT_THREADS,
            proxy: None,
            output_dir: PathBuf::from("."),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
        }
    }

    /// Set the requested number of worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Route connections through a SOCKS5 proxy.
    pub fn with_proxy(mut self, proxy: Option<ProxyTarget>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Write the output file into `dir`.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Follow at most `max_redirects` redirects per request.
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Attempts made when opening a new connection (minimum 1).
    pub fn with_connect_attempts(mut self, attempts: usize) -> Self {
        self.connect_attempts = attempts.max(1);
        self
    }

    /// Requested threads clamped to `1..=MAX_THREADS`.
    pub fn effective_threads(&self) -> usize {
        self.threads.clamp(1, MAX_THREADS)
    }
}
