//! Download strategies: one full-file request, or concurrent range
//! requests reassembled afterwards.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;

use super::assemble::{assemble, remove_parts};
use super::error::{DownloadError, DownloadResult};
use super::partition::ByteRange;
use super::report::RangeOutcome;
use crate::http::HttpClient;

/// Buffer size for writing response bodies to disk (64KB).
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Strategy for fetching a resource into a destination file.
pub trait DownloadStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch `url` into `destination`.
    ///
    /// # Returns
    ///
    /// One outcome per request issued, in range order.
    fn execute(
        &self,
        client: &HttpClient,
        url: &str,
        destination: &Path,
    ) -> DownloadResult<Vec<RangeOutcome>>;
}

/// Single `GET` without a `Range` header, written straight to the
/// destination.
#[derive(Debug, Default)]
pub struct FullFileStrategy;

impl FullFileStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl DownloadStrategy for FullFileStrategy {
    fn name(&self) -> &'static str {
        "full-file"
    }

    fn execute(
        &self,
        client: &HttpClient,
        url: &str,
        destination: &Path,
    ) -> DownloadResult<Vec<RangeOutcome>> {
        let mut client = client.clone();
        client.remove_header("Range");

        let bytes = fetch_to_file(&client, url, destination)
            .inspect_err(|_| remove_parts(&[destination.to_path_buf()]))?;
        Ok(vec![RangeOutcome { range: None, bytes }])
    }
}

/// One worker thread per range, each with its own pooled connection and
/// temporary file. The parts are concatenated in range order once every
/// worker has finished.
///
/// Any failed range aborts the download: temporary files are removed and
/// no output file is produced.
#[derive(Debug)]
pub struct RangedStrategy {
    ranges: Vec<ByteRange>,
}

impl RangedStrategy {
    /// Create a strategy fetching `ranges`, which must be ascending and
    /// contiguous.
    pub fn new(ranges: Vec<ByteRange>) -> Self {
        Self { ranges }
    }
}

impl DownloadStrategy for RangedStrategy {
    fn name(&self) -> &'static str {
        "ranged"
    }

    fn execute(
        &self,
        client: &HttpClient,
        url: &str,
        destination: &Path,
    ) -> DownloadResult<Vec<RangeOutcome>> {
        let parts: Vec<PathBuf> = self
            .ranges
            .iter()
            .map(|range| range.temp_path(destination))
            .collect();

        let handles: Vec<_> = self
            .ranges
            .iter()
            .zip(&parts)
            .map(|(&range, part)| {
                let mut client = client.clone();
                client.set_header("Range", range.header_value());
                let url = url.to_string();
                let part = part.clone();
                let handle = thread::spawn(move || fetch_range(&client, &url, range, &part));
                (range, handle)
            })
            .collect();

        // Join every worker before looking at results so no thread is
        // still writing when the parts are cleaned up.
        let results: Vec<DownloadResult<RangeOutcome>> = handles
            .into_iter()
            .map(|(range, handle)| {
                handle
                    .join()
                    .unwrap_or(Err(DownloadError::WorkerPanicked { range }))
            })
            .collect();

        let mut outcomes = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "range download failed, discarding partial files");
                    remove_parts(&parts);
                    return Err(e);
                }
            }
        }

        if let Err(e) = assemble(&parts, destination) {
            remove_parts(&parts);
            return Err(e);
        }
        Ok(outcomes)
    }
}

fn fetch_range(
    client: &HttpClient,
    url: &str,
    range: ByteRange,
    part: &Path,
) -> DownloadResult<RangeOutcome> {
    tracing::debug!(range = %range, path = %part.display(), "range worker started");

    let wrap = |source: DownloadError| DownloadError::Range {
        range,
        source: Box::new(source),
    };

    let bytes = fetch_to_file(client, url, part).map_err(wrap)?;
    if bytes != range.len() {
        return Err(wrap(DownloadError::RangeLength {
            range,
            expected: range.len(),
            received: bytes,
        }));
    }

    tracing::info!(range = %range, bytes, "range complete");
    Ok(RangeOutcome {
        range: Some(range),
        bytes,
    })
}

/// `GET` `url` into a newly created file at `path`.
fn fetch_to_file(client: &HttpClient, url: &str, path: &Path) -> DownloadResult<u64> {
    let file = File::create(path).map_err(|e| DownloadError::io(path, e))?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

    let (response, bytes) = client.get_to(url, &mut writer)?;
    if !(200..300).contains(&response.status) {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: response.status,
        });
    }

    writer.flush().map_err(|e| DownloadError::io(path, e))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionPool;
    use crate::download::partition::partition;
    use crate::testing::{ok_response, request_header, Reply, TestServer};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn content(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    /// Serves `data`, honouring `Range: bytes=b-e` headers.
    fn range_server(data: Vec<u8>) -> TestServer {
        TestServer::start(move |head| {
            let Some(spec) = request_header(head, "Range").and_then(|v| v.strip_prefix("bytes="))
            else {
                return Reply::keep_alive(ok_response(&data));
            };
            let (b, e) = spec.split_once('-').unwrap();
            let (b, e): (usize, usize) = (b.parse().unwrap(), e.parse().unwrap());
            let slice = &data[b..=e];
            let mut bytes = format!(
                "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\n\
                 Content-Range: bytes {}-{}/{}\r\n\r\n",
                slice.len(),
                b,
                e,
                data.len()
            )
            .into_bytes();
            bytes.extend_from_slice(slice);
            Reply::keep_alive(bytes)
        })
    }

    fn client() -> HttpClient {
        HttpClient::new().with_pool(Arc::new(ConnectionPool::new()))
    }

    #[test]
    fn test_full_file_strategy() {
        let data = content(5000);
        let server = range_server(data.clone());
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("full.bin");

        let mut client = client();
        client.set_header("Range", "bytes=0-0");
        let outcomes = FullFileStrategy::new()
            .execute(&client, &server.url("/full.bin"), &dest)
            .unwrap();

        assert_eq!(outcomes, vec![RangeOutcome { range: None, bytes: 5000 }]);
        assert_eq!(fs::read(&dest).unwrap(), data);
        assert!(request_header(&server.requests()[0], "Range").is_none());
    }

    #[test]
    fn test_ranged_strategy_matches_full_fetch() {
        let data = content(10_007);
        let server = range_server(data.clone());
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("ranged.bin");

        let strategy = RangedStrategy::new(partition(data.len() as u64, 4));
        let outcomes = strategy
            .execute(&client(), &server.url("/ranged.bin"), &dest)
            .unwrap();

        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0].bytes, 2502);
        assert_eq!(outcomes[3].bytes, 2501);
        assert_eq!(fs::read(&dest).unwrap(), data);

        let leftovers: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_short_range_aborts_and_cleans_up() {
        // Ignores Range and always sends the first 10 bytes.
        let server = TestServer::start(|_| Reply::keep_alive(ok_response(b"0123456789")));
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("broken.bin");

        let strategy = RangedStrategy::new(partition(40, 2));
        let err = strategy
            .execute(&client(), &server.url("/broken.bin"), &dest)
            .unwrap_err();

        match err {
            DownloadError::Range { range, source } => {
                assert_eq!(range, ByteRange::new(0, 19));
                assert!(matches!(*source, DownloadError::RangeLength { received: 10, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_error_status_fails() {
        let server = TestServer::start(|_| {
            Reply::keep_alive("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
        });
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("missing.bin");

        let err = FullFileStrategy::new()
            .execute(&client(), &server.url("/missing.bin"), &dest)
            .unwrap_err();
        assert!(matches!(err, DownloadError::Status { status: 404, .. }));
        assert!(!dest.exists());
    }
}
