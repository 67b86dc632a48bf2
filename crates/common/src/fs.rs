//! Directory copy and removal helpers shared by the installer and the backup
//! snapshot code.

use std::path::Path;

use walkdir::WalkDir;

use crate::{
    error::Result,
    paths::{absolutize, ensure_safe},
};

/// Recursively copy `src` into `dest`, dereferencing symlinks.
///
/// Every destination path is checked against `dest` before it is written.
pub fn copy_dir_all(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;

    for entry in WalkDir::new(src).min_depth(1).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| crate::Error::message(format!("strip prefix: {e}")))?;
        let target = dest.join(relative);
        ensure_safe(dest, &target)?;

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

/// Remove whatever lives at `path`: a symlink is unlinked (its target is left
/// alone), a directory is removed recursively, a file is deleted.
///
/// Returns `false` when nothing was there.
pub fn remove_path(path: &Path) -> Result<bool> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    if meta.file_type().is_symlink() {
        remove_symlink(path)?;
    } else if meta.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    tracing::debug!(path = %absolutize(path).display(), "removed");
    Ok(true)
}

#[cfg(windows)]
fn remove_symlink(path: &Path) -> std::io::Result<()> {
    // Directory symlinks on Windows must go through remove_dir.
    std::fs::remove_dir(path).or_else(|_| std::fs::remove_file(path))
}

#[cfg(not(windows))]
fn remove_symlink(path: &Path) -> std::io::Result<()> {
    std::fs::remove_file(path)
}

/// Whether `path` is a symlink (without following it).
pub fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}
