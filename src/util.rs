//! Filesystem utility functions used across the crate.

use anyhow::{Context, Result};
use std::{fs, path::Path};

/// Mode given to every file written into the output tree.
pub const FILE_MODE: u32 = 0o644;

/// Remove a path regardless of whether it is a file, symlink, or directory.
pub fn remove_any(p: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(p).with_context(|| format!("stat {}", p.display()))?;

    if meta.is_dir() {
        fs::remove_dir_all(p)
    } else {
        fs::remove_file(p)
    }
    .with_context(|| format!("remove {}", p.display()))
}

/// Empty `dir` by removing and recreating it.
pub fn recreate_dir(dir: &Path) -> Result<()> {
    if fs::symlink_metadata(dir).is_ok() {
        remove_any(dir)?;
    }
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))
}

/// Write `contents` to `path` (truncating), then force [`FILE_MODE`].
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    set_mode(path)
}

#[cfg(unix)]
fn set_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(FILE_MODE))
        .with_context(|| format!("chmod {}", path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path) -> Result<()> {
    Ok(())
}
