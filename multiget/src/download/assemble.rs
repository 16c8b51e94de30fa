//! Reassembly of per-range temporary files into the output file.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use super::error::{DownloadError, DownloadResult};

/// Concatenate `parts` in order into `destination`.
///
/// Any existing `destination` is removed first. The first part is used as
/// the append target; every later part is appended to it and deleted, then
/// the first part is renamed to `destination`. Returns the final size.
pub fn assemble(parts: &[PathBuf], destination: &Path) -> DownloadResult<u64> {
    remove_if_exists(destination)?;

    let Some((first, rest)) = parts.split_first() else {
        File::create(destination).map_err(|e| DownloadError::io(destination, e))?;
        return Ok(0);
    };

    {
        let mut target = OpenOptions::new()
            .append(true)
            .open(first)
            .map_err(|e| DownloadError::io(first, e))?;

        for part in rest {
            let mut source = File::open(part).map_err(|e| DownloadError::io(part, e))?;
            io::copy(&mut source, &mut target).map_err(|e| DownloadError::io(first, e))?;
            drop(source);
            fs::remove_file(part).map_err(|e| DownloadError::io(part, e))?;
        }
    }

    fs::rename(first, destination).map_err(|e| DownloadError::io(destination, e))?;
    let size = fs::metadata(destination)
        .map_err(|e| DownloadError::io(destination, e))?
        .len();

    tracing::debug!(
        path = %destination.display(),
        parts = parts.len(),
        size,
        "assembled output file"
    );
    Ok(size)
}

/// Best-effort removal of temporary part files.
pub fn remove_parts(parts: &[PathBuf]) {
    for part in parts {
        if let Err(e) = fs::remove_file(part) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %part.display(),
                    error = %e,
                    "failed to remove temporary file"
                );
            }
        }
    }
}

fn remove_if_exists(path: &Path) -> DownloadResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DownloadError::io(path, e)),
    }
}
