//! CLI error type.

use thiserror::Error;

use multiget::connection::ProxyParseError;
use multiget::DownloadError;

/// Errors that end the program with a failure status.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Proxy(#[from] ProxyParseError),

    #[error("download failed: {0}")]
    Download(#[from] DownloadError),
}
