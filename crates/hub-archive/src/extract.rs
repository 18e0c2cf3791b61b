use std::fs;
use std::io::{self, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{Error, Result};
use crate::sanitize;

#[cfg(unix)]
const DIRECTORY_MODE: u32 = 0o777;

/// Summary of an expansion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Report {
    pub directories: usize,
    pub files: usize,
    pub skipped: usize,
    pub total_bytes: u64,
}

/// Expand a gzip-compressed tar stream under `destination`.
///
/// Directories and regular files are materialized; any other entry type
/// is skipped. The stream is consumed incrementally.
pub fn extract<R: Read>(reader: R, destination: &Path) -> Result<Report> {
    ensure_directory(destination)?;

    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let mut report = Report::default();

    for entry in archive.entries().map_err(Error::Corrupted)? {
        let mut entry = entry.map_err(Error::Corrupted)?;
        let original = entry.path().map_err(Error::Corrupted)?.into_owned();
        let Some(target) = sanitize::resolve(&original, destination)? else {
            continue;
        };

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            ensure_directory(&target)?;
            report.directories += 1;
        } else if entry_type.is_file() {
            report.total_bytes += write_file(&mut entry, &target)?;
            report.files += 1;
        } else {
            debug!(entry = %original.display(), "skipped: unsupported entry type");
            report.skipped += 1;
        }
    }

    Ok(report)
}

fn write_file(reader: &mut impl Read, target: &Path) -> Result<u64> {
    if let Some(parent) = target.parent() {
        ensure_directory(parent)?;
    }
    let mut file = fs::File::create(target).map_err(|e| Error::ExtractionFailed {
        path: target.to_path_buf(),
        source: e,
    })?;
    io::copy(reader, &mut file).map_err(|e| Error::ExtractionFailed {
        path: target.to_path_buf(),
        source: e,
    })
}

fn ensure_directory(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIRECTORY_MODE);
    }
    builder
        .create(path)
        .map_err(|e| Error::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        })
}
