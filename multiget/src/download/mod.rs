//! Range-partitioned downloading.
//!
//! This module turns one resource into a local file, including:
//! - Splitting a known size into contiguous byte ranges (`partition`)
//! - Full-file and concurrent ranged strategies (`strategy`)
//! - Ordered reassembly of per-range temporary files (`assemble`)
//! - High-level orchestration driven by a `HEAD` probe (`orchestrator`)
//!
//! # Architecture
//!
//! ```text
//! Downloader (orchestrator)
//!         │
//!         ├── HttpClient::head (size and Accept-Ranges)
//!         │
//!         ├── DownloadStrategy (trait)
//!         │       ├── FullFileStrategy
//!         │       └── RangedStrategy ── one thread per ByteRange
//!         │                   │
//!         │                   └── assemble (ascending range order)
//!         │
//!         └── DownloadReport
//! ```
//!
//! # Example
//!
//! ```ignore
//! use multiget::{DownloadConfig, Downloader};
//!
//! let config = DownloadConfig::new("https://example.com/file.iso").with_threads(8);
//! let report = Downloader::new(config).run()?;
//! println!("{}", report);
//! ```

mod assemble;
mod error;
mod orchestrator;
mod partition;
mod report;
mod strategy;

pub use assemble::{assemble, remove_parts};
pub use error::{DownloadError, DownloadResult};
pub use orchestrator::Downloader;
pub use partition::{clamp_threads, partition, ByteRange};
pub use report::{format_speed, DownloadReport, RangeOutcome};
pub use strategy::{DownloadStrategy, FullFileStrategy, RangedStrategy};
