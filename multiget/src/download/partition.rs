//! Splitting a resource into contiguous byte ranges.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::MAX_THREADS;

/// A closed byte interval `[begin, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteRange {
    pub begin: u64,
    pub end: u64,
}

#[allow(clippy::len_without_is_empty)]
impl ByteRange {
    pub fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    /// Number of bytes covered.
    pub fn len(&self) -> u64 {
        self.end - self.begin + 1
    }

    /// Value for the `Range` request header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.begin, self.end)
    }

    /// Temporary file holding this range of `destination`:
    /// `<destination>.<begin>-<end>`.
    pub fn temp_path(&self, destination: &Path) -> PathBuf {
        let mut name = destination.as_os_str().to_owned();
        name.push(format!(".{}-{}", self.begin, self.end));
        PathBuf::from(name)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.begin, self.end)
    }
}

/// Clamp a requested thread count to `1..=MAX_THREADS`, and to the file
/// size so that no range is empty.
pub fn clamp_threads(requested: usize, file_size: u64) -> usize {
    let by_size = usize::try_from(file_size).unwrap_or(usize::MAX).max(1);
    requested.clamp(1, MAX_THREADS).min(by_size)
}

/// Split `[0, size - 1]` into `threads` ranges whose lengths differ by at
/// most one byte, the longer ones first.
///
/// An empty resource yields no ranges. More threads than bytes yields one
/// range per byte.
pub fn partition(size: u64, threads: usize) -> Vec<ByteRange> {
    if size == 0 {
        return Vec::new();
    }

    let count = (threads.max(1) as u64).min(size);
    let base = size / count;
    let remainder = size % count;

    let mut ranges = Vec::with_capacity(count as usize);
    let mut begin = 0;
    for i in 0..count {
        let len = base + u64::from(i < remainder);
        ranges.push(ByteRange::new(begin, begin + len - 1));
        begin += len;
    }
    ranges
}
