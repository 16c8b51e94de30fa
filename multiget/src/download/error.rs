//! Download error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::partition::ByteRange;
use crate::http::HttpError;
use crate::url::UrlError;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors that abort a download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The URL could not be parsed.
    #[error(transparent)]
    Url(#[from] UrlError),

    /// A request failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: i32 },

    /// A range request delivered a different number of bytes than asked.
    #[error("range {range} returned {received} bytes, expected {expected}")]
    RangeLength {
        range: ByteRange,
        expected: u64,
        received: u64,
    },

    /// A range failed; the whole download is abandoned.
    #[error("range {range} failed: {source}")]
    Range {
        range: ByteRange,
        #[source]
        source: Box<DownloadError>,
    },

    /// A worker thread panicked.
    #[error("worker for range {range} panicked")]
    WorkerPanicked { range: ByteRange },

    /// Reading or writing a local file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DownloadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DownloadError::Io {
            path: path.into(),
            source,
        }
    }
}
