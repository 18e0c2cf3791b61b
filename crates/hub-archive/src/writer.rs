use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Gzip-compressed tar writer.
///
/// Entries are written to the sink as they are added; nothing beyond the
/// current file block is held in memory.
pub struct Writer<W: Write> {
    builder: tar::Builder<GzEncoder<W>>,
}

impl<W: Write> Writer<W> {
    pub fn new(sink: W) -> Self {
        let mut builder = tar::Builder::new(GzEncoder::new(sink, Compression::default()));
        builder.follow_symlinks(false);
        Self { builder }
    }

    /// Add the contents of `root`.
    ///
    /// Entry names are relative to `root`; `root` itself is not an entry.
    /// Only directories and regular files are written. Entries are visited
    /// in file-name order so the archive layout is deterministic.
    pub fn add_dir(&mut self, root: &Path) -> Result<()> {
        let meta = fs::metadata(root).map_err(|e| Error::Read {
            path: root.to_path_buf(),
            source: e,
        })?;
        if !meta.is_dir() {
            return Err(Error::NotDirectory(root.to_path_buf()));
        }

        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Walk {
                path: root.to_path_buf(),
                source: e,
            })?;
            let name = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| Error::PathTraversal {
                    entry: entry.path().to_path_buf(),
                })?;
            let file_type = entry.file_type();
            if file_type.is_dir() {
                self.builder
                    .append_dir(name, entry.path())
                    .map_err(|e| Error::Read {
                        path: entry.path().to_path_buf(),
                        source: e,
                    })?;
            } else if file_type.is_file() {
                self.add_file(entry.path(), name)?;
            } else {
                debug!(path = %entry.path().display(), "skipped: not a file or directory");
            }
        }
        Ok(())
    }

    /// Add the regular file at `path` under the entry `name`.
    pub fn add_file(&mut self, path: &Path, name: impl AsRef<Path>) -> Result<()> {
        let mut file = fs::File::open(path).map_err(|e| Error::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.builder
            .append_file(name, &mut file)
            .map_err(|e| Error::Read {
                path: path.to_path_buf(),
                source: e,
            })
    }

    /// Write the archive trailer, flush the compressor and return the sink.
    pub fn finish(self) -> Result<W> {
        let encoder = self.builder.into_inner()?;
        Ok(encoder.finish()?)
    }
}
