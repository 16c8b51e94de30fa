//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use multiget::config::{DEFAULT_LOG_FILE, DEFAULT_THREADS};
use multiget::{DownloadConfig, ProxyTarget};

use crate::error::CliError;

/// Multi-threaded HTTP/HTTPS downloader.
#[derive(Debug, Parser)]
#[command(name = "multi-get", version, about)]
pub struct Args {
    /// Download using N threads (clamped to 1..=32)
    #[arg(short = 'n', value_name = "N", allow_negative_numbers = true)]
    pub threads: Option<String>,

    /// SOCKS5 proxy, e.g. socks5://127.0.0.1:1080
    #[arg(short = 'x', value_name = "PROXY")]
    pub proxy: Option<String>,

    /// Directory to save the file in
    #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Log file path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// http:// or https:// URL to download
    pub url: String,
}

impl Args {
    /// Thread count from `-n`. A value that is not a number falls back to
    /// the default with a warning; out-of-range numbers are clamped later.
    pub fn thread_count(&self) -> usize {
        let Some(raw) = self.threads.as_deref() else {
            return DEFAULT_THREADS;
        };
        match raw.trim().parse::<i64>() {
            Ok(n) => usize::try_from(n.max(0)).unwrap_or(usize::MAX),
            Err(_) => {
                eprintln!(
                    "Warning: invalid thread count {:?}, using {}",
                    raw, DEFAULT_THREADS
                );
                tracing::warn!(value = raw, "invalid thread count, using default");
                DEFAULT_THREADS
            }
        }
    }

    /// Build the download configuration. A proxy string that is not
    /// `socks5://host:port` disables proxying; a bad port is an error.
    pub fn to_config(&self) -> Result<DownloadConfig, CliError> {
        let proxy = match self.proxy.as_deref() {
            Some(spec) => {
                let proxy = ProxyTarget::parse(spec)?;
                if proxy.is_none() {
                    tracing::warn!(proxy = spec, "unsupported proxy, connecting directly");
                }
                proxy
            }
            None => None,
        };

        Ok(DownloadConfig::new(self.url.clone())
            .with_threads(self.thread_count())
            .with_proxy(proxy)
            .with_output_dir(self.output_dir.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("multi-get").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["http://example.com/f"]).unwrap();
        assert_eq!(args.thread_count(), DEFAULT_THREADS);
        assert_eq!(args.output_dir, PathBuf::from("."));
        assert_eq!(args.log_file, PathBuf::from(DEFAULT_LOG_FILE));

        let config = args.to_config().unwrap();
        assert_eq!(config.url, "http://example.com/f");
        assert_eq!(config.proxy, None);
    }

    #[test]
    fn test_threads_and_proxy() {
        let args = parse(&["-n", "8", "-x", "socks5://127.0.0.1:1080", "http://h/f"]).unwrap();
        let config = args.to_config().unwrap();
        assert_eq!(config.threads, 8);
        assert_eq!(config.proxy, Some(ProxyTarget::new("127.0.0.1", 1080)));
    }

    #[test]
    fn test_non_numeric_threads_fall_back() {
        let args = parse(&["-n", "many", "http://h/f"]).unwrap();
        assert_eq!(args.thread_count(), DEFAULT_THREADS);
    }

    #[test]
    fn test_negative_threads_clamp_to_minimum() {
        let args = parse(&["-n", "-3", "http://h/f"]).unwrap();
        assert_eq!(args.thread_count(), 0);
        assert_eq!(args.to_config().unwrap().effective_threads(), 1);
    }

    #[test]
    fn test_unsupported_proxy_is_ignored() {
        let args = parse(&["-x", "http://proxy:8080", "http://h/f"]).unwrap();
        assert_eq!(args.to_config().unwrap().proxy, None);
    }

    #[test]
    fn test_bad_proxy_port_is_error() {
        let args = parse(&["-x", "socks5://proxy:80a", "http://h/f"]).unwrap();
        assert!(matches!(args.to_config(), Err(CliError::Proxy(_))));
    }

    #[test]
    fn test_positional_arguments_required_and_limited() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["http://a/", "http://b/"]).is_err());
    }

    #[test]
    fn test_help_is_display_help() {
        let err = parse(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
