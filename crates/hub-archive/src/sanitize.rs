use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Resolve an archive entry name against the extraction root.
///
/// Leading `/` and `.` components are dropped, so names written as
/// `/sub/file` by other producers land under `base`. Any `..` component
/// is rejected. Returns `None` for names that resolve to `base` itself.
pub(crate) fn resolve(entry: &Path, base: &Path) -> Result<Option<PathBuf>> {
    if entry.as_os_str().as_encoded_bytes().contains(&0) {
        return Err(Error::InvalidPath);
    }

    let mut relative = PathBuf::new();
    for component in entry.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(Error::PathTraversal {
                    entry: entry.to_path_buf(),
                });
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Ok(None);
    }
    Ok(Some(base.join(relative)))
}
