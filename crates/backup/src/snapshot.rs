//! Isolated copies of skill folders taken right before they are submitted.

use std::path::{Path, PathBuf};

use {
    chrono::{DateTime, Utc},
    skillport_common::{
        fs::{copy_dir_all, remove_path},
        paths::ensure_safe,
    },
    skillport_skills::parse::sanitize_slug,
    tracing::debug,
};

use crate::error::{Error, Result};

/// One snapshot directory per apply run; one numbered folder per item.
#[derive(Debug, Clone)]
pub struct SnapshotManager {
    root: PathBuf,
}

impl SnapshotManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<data_dir>/backups/snapshots/<YYYYmmddTHHMMSSZ>`, suffixed when a run
    /// with the same timestamp already left its directory behind.
    pub fn for_run(data_dir: &Path, started_at: DateTime<Utc>) -> Self {
        let base = data_dir.join("backups").join("snapshots");
        let stamp = started_at.format("%Y%m%dT%H%M%SZ").to_string();
        let mut root = base.join(&stamp);
        let mut n = 2;
        while root.exists() {
            root = base.join(format!("{stamp}-{n}"));
            n += 1;
        }
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy `source` (following symlinks) to `<root>/<NNN>-<slug>`, where
    /// `NNN` is `index + 1`. The destination must not exist yet.
    pub fn take(&self, index: usize, slug: &str, source: &Path) -> Result<PathBuf> {
        let dest = self
            .root
            .join(format!("{:03}-{}", index + 1, sanitize_slug(slug)));
        ensure_safe(&self.root, &dest)?;
        if std::fs::symlink_metadata(&dest).is_ok() {
            return Err(Error::message(format!(
                "snapshot {} already exists",
                dest.display()
            )));
        }
        if !source.is_dir() {
            return Err(Error::message(format!(
                "source folder {} is missing",
                source.display()
            )));
        }
        copy_dir_all(source, &dest)?;
        debug!(source = %source.display(), snapshot = %dest.display(), "took snapshot");
        Ok(dest)
    }

    /// Delete the whole run directory. Returns `false` if nothing was taken.
    pub fn remove(&self) -> Result<bool> {
        Ok(remove_path(&self.root)?)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_are_numbered_and_independent_of_the_source() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("live");
        std::fs::create_dir_all(source.join("scripts")).unwrap();
        std::fs::write(source.join("SKILL.md"), "v1").unwrap();
        std::fs::write(source.join("scripts/run.sh"), "echo").unwrap();

        let manager = SnapshotManager::new(tmp.path().join("snap"));
        let snap = manager.take(0, "My Skill", &source).unwrap();
        assert!(snap.ends_with("001-my-skill"));

        std::fs::write(source.join("SKILL.md"), "v2").unwrap();
        assert_eq!(std::fs::read_to_string(snap.join("SKILL.md")).unwrap(), "v1");
        assert_eq!(std::fs::read_to_string(snap.join("scripts/run.sh")).unwrap(), "echo");

        assert!(manager.take(0, "My Skill", &source).is_err());
        assert!(manager.take(1, "gone", &tmp.path().join("missing")).is_err());

        assert!(manager.remove().unwrap());
        assert!(!manager.root().exists());
        assert!(!manager.remove().unwrap());
    }

    #[test]
    fn run_directories_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let first = SnapshotManager::for_run(tmp.path(), at);
        assert!(first.root().ends_with("backups/snapshots/20231114T221320Z"));
        std::fs::create_dir_all(first.root()).unwrap();
        let second = SnapshotManager::for_run(tmp.path(), at);
        assert!(second.root().ends_with("20231114T221320Z-2"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_files_are_dereferenced() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("live");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(tmp.path().join("shared.md"), "shared").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("shared.md"), source.join("ref.md")).unwrap();

        let manager = SnapshotManager::new(tmp.path().join("snap"));
        let snap = manager.take(0, "x", &source).unwrap();
        let copied = snap.join("ref.md");
        assert!(!std::fs::symlink_metadata(&copied).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(copied).unwrap(), "shared");
    }
}
