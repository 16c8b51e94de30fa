//! Summary of a finished download.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::partition::ByteRange;

/// Outcome of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeOutcome {
    /// Range fetched, or `None` for a full-file request.
    pub range: Option<ByteRange>,
    pub bytes: u64,
}

/// What a completed download produced.
#[derive(Debug, Clone)]
pub struct DownloadReport {
    /// Path of the output file.
    pub path: PathBuf,
    /// Size advertised by the server, if any.
    pub content_length: Option<u64>,
    /// Size of the output file.
    pub bytes_written: u64,
    /// Per-worker byte counts in range order.
    pub ranges: Vec<RangeOutcome>,
    pub elapsed: Duration,
}

impl DownloadReport {
    /// Whether the file was fetched as several ranges.
    pub fn is_ranged(&self) -> bool {
        self.ranges.iter().any(|outcome| outcome.range.is_some())
    }

    /// Average throughput in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.bytes_written as f64 / secs
    }

    /// Average throughput formatted with a binary unit.
    pub fn average_speed(&self) -> String {
        format_speed(self.bytes_per_second())
    }
}

/// Format a byte rate in KB/s, MB/s, GB/s or TB/s (powers of 1024).
pub fn format_speed(bytes_per_second: f64) -> String {
    const UNITS: [&str; 4] = ["KB/s", "MB/s", "GB/s", "TB/s"];

    let mut value = bytes_per_second / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

impl fmt::Display for DownloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, outcome) in self.ranges.iter().enumerate() {
            match outcome.range {
                Some(range) => writeln!(
                    f,
                    "Thread {} downloaded {} bytes (range {})",
                    index, outcome.bytes, range
                )?,
                None => writeln!(f, "Thread {} downloaded {} bytes", index, outcome.bytes)?,
            }
        }
        writeln!(f, "Saved {} ({} bytes)", self.path.display(), self.bytes_written)?;
        writeln!(f, "Time spent: {:.3}s", self.elapsed.as_secs_f64())?;
        write!(f, "Average speed: {}", self.average_speed())
    }
}
