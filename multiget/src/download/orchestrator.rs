//! Download orchestration.
//!
//! A `HEAD` request decides how the resource is fetched: with a known size
//! and byte-range support it is split into ranges fetched concurrently,
//! otherwise a single full `GET` is made.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use super::error::{DownloadError, DownloadResult};
use super::partition::{clamp_threads, partition};
use super::report::DownloadReport;
use super::strategy::{DownloadStrategy, FullFileStrategy, RangedStrategy};
use crate::config::DownloadConfig;
use crate::connection::{ConnectionPool, DEFAULT_CONNECT_ATTEMPTS};
use crate::http::{HttpClient, HttpResponse};
use crate::url::Endpoint;

/// Downloads one resource according to a [`DownloadConfig`].
#[derive(Debug)]
pub struct Downloader {
    config: DownloadConfig,
    client: HttpClient,
}

impl Downloader {
    /// Create a downloader using the process-wide connection pool.
    ///
    /// A dedicated pool is used when the configuration asks for a
    /// non-default number of connection attempts.
    pub fn new(config: DownloadConfig) -> Self {
        let pool = if config.connect_attempts == DEFAULT_CONNECT_ATTEMPTS {
            ConnectionPool::global()
        } else {
            Arc::new(ConnectionPool::with_connect_attempts(
                config.connect_attempts,
            ))
        };
        let client = HttpClient::new().with_pool(pool);
        Self::with_client(config, client)
    }

    /// Create a downloader issuing requests through `client`. The proxy and
    /// redirect limit from `config` are applied to it.
    pub fn with_client(config: DownloadConfig, client: HttpClient) -> Self {
        let mut client = client.with_max_redirects(config.max_redirects);
        client.set_proxy(config.proxy.clone());
        Self { config, client }
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Path the output file is written to: the output directory joined with
    /// the URL's file name.
    pub fn destination(&self) -> DownloadResult<PathBuf> {
        let endpoint = Endpoint::parse(&self.config.url)?;
        Ok(self.config.output_dir.join(endpoint.file_name()))
    }

    /// Issue the `HEAD` request that sizes the resource.
    pub fn probe(&self) -> DownloadResult<HttpResponse> {
        tracing::info!(url = %self.config.url, "probing resource");
        Ok(self.client.head(&self.config.url)?)
    }

    /// Pick a strategy from the `HEAD` response.
    pub fn choose_strategy(&self, head: &HttpResponse) -> Box<dyn DownloadStrategy> {
        if !(200..300).contains(&head.status) {
            tracing::warn!(status = head.status, "HEAD not successful, fetching whole file");
            return Box::new(FullFileStrategy::new());
        }

        let Some(size) = head.content_length() else {
            tracing::info!("no Content-Length, fetching whole file");
            return Box::new(FullFileStrategy::new());
        };
        if size == 0 {
            return Box::new(FullFileStrategy::new());
        }

        let threads = clamp_threads(self.config.effective_threads(), size);
        if threads > 1 && !head.accepts_byte_ranges() {
            tracing::warn!("server does not support range requests, using a single thread");
            return Box::new(FullFileStrategy::new());
        }

        Box::new(RangedStrategy::new(partition(size, threads)))
    }

    /// Probe the resource, then download it.
    pub fn run(&self) -> DownloadResult<DownloadReport> {
        let head = self.probe()?;
        self.download(&head)
    }

    /// Download the resource described by an earlier [`probe`](Self::probe).
    pub fn download(&self, head: &HttpResponse) -> DownloadResult<DownloadReport> {
        let started = Instant::now();
        let destination = self.destination()?;
        if !self.config.output_dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.config.output_dir)
                .map_err(|e| DownloadError::io(&self.config.output_dir, e))?;
        }

        let strategy = self.choose_strategy(head);
        tracing::info!(
            url = %self.config.url,
            path = %destination.display(),
            strategy = strategy.name(),
            "starting download"
        );

        let ranges = strategy.execute(&self.client, &self.config.url, &destination)?;
        let bytes_written = fs::metadata(&destination)
            .map_err(|e| DownloadError::io(&destination, e))?
            .len();

        let report = DownloadReport {
            path: destination,
            content_length: head.content_length(),
            bytes_written,
            ranges,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            path = %report.path.display(),
            bytes = report.bytes_written,
            speed = %report.average_speed(),
            "download complete"
        );
        Ok(report)
    }
}
