//! multi-get - command-line downloader
//!
//! Usage: `multi-get [-n N] [-x socks5://host:port] <url>`

mod args;
mod error;

use std::process::ExitCode;

use clap::Parser;
use multiget::logging::init_file_logging;
use multiget::Downloader;

use crate::args::Args;
use crate::error::CliError;

fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match init_file_logging(&args.log_file) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "multi-get failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), CliError> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), url = %args.url, "multi-get starting");

    let config = args.to_config()?;
    let downloader = Downloader::new(config);

    let head = downloader.probe()?;
    println!("{}", head.display_headers());

    let report = downloader.download(&head)?;
    println!("{}", report);
    Ok(())
}
