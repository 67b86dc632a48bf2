//! Per-machine ledger of installed skills.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    skillport_remote::Visibility,
    tracing::{debug, warn},
};

use crate::{error::Result, install::TargetMode};

pub const LOCK_VERSION: u32 = 1;

pub const LOCK_FILE: &str = "skills-lock.json";

/// What is installed where, keyed by local folder name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallLock {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub skills: BTreeMap<String, InstallLockSkillEntry>,
}

impl Default for InstallLock {
    fn default() -> Self {
        Self {
            version: LOCK_VERSION,
            updated_at: DateTime::<Utc>::default(),
            skills: BTreeMap::new(),
        }
    }
}

impl InstallLock {
    /// Entry installed from `skill_id`, with its folder name.
    pub fn find_by_skill_id(&self, skill_id: &str) -> Option<(&str, &InstallLockSkillEntry)> {
        self.skills
            .iter()
            .find(|(_, entry)| entry.skill_id == skill_id)
            .map(|(name, entry)| (name.as_str(), entry))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallLockSkillEntry {
    pub skill_id: String,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub visibility: Visibility,
    pub canonical_path: PathBuf,
    pub source: LockSource,
    /// When this machine last installed the skill.
    pub updated_at: DateTime<Utc>,
    /// Remote `updated_at` at install time; drives the unchanged check.
    pub remote_updated_at: DateTime<Utc>,
    #[serde(default)]
    pub targets: BTreeMap<String, LockTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSource {
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockTarget {
    pub path: PathBuf,
    pub mode: TargetMode,
    pub symlink_failed: bool,
    pub installed_at: DateTime<Utc>,
}

/// Lock file storage with atomic writes.
///
/// Reads never fail: a missing, unreadable, or foreign-version file is an
/// empty lock. Concurrent processes are not arbitrated; the last rename wins.
#[derive(Debug, Clone)]
pub struct LockStore {
    path: PathBuf,
}

impl LockStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default lock path: `<config_dir>/skills-lock.json`.
    pub fn default_path() -> PathBuf {
        skillport_config::config_dir().join(LOCK_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> InstallLock {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "unreadable lock file, treating as empty");
                }
                return InstallLock::default();
            },
        };
        match serde_json::from_str::<InstallLock>(&data) {
            Ok(lock) if lock.version == LOCK_VERSION => lock,
            Ok(lock) => {
                warn!(found = lock.version, expected = LOCK_VERSION, "lock version mismatch, treating as empty");
                InstallLock::default()
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt lock file, treating as empty");
                InstallLock::default()
            },
        }
    }

    /// Replace the whole document via temp file + rename.
    pub fn write(&self, lock: &InstallLock) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(lock)?;
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), skills = lock.skills.len(), "wrote lock");
        Ok(())
    }

    /// Read, apply `f`, stamp `updated_at`, write back.
    pub fn update<T>(&self, f: impl FnOnce(&mut InstallLock) -> T) -> Result<T> {
        let mut lock = self.read();
        let out = f(&mut lock);
        lock.version = LOCK_VERSION;
        lock.updated_at = Utc::now();
        self.write(&lock)?;
        Ok(out)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn entry(skill_id: &str) -> InstallLockSkillEntry {
        InstallLockSkillEntry {
            skill_id: skill_id.into(),
            slug: "pdf".into(),
            name: "PDF".into(),
            description: "d".into(),
            visibility: Visibility::Private,
            canonical_path: PathBuf::from("/store/pdf"),
            source: LockSource {
                server: "http://localhost:8787".into(),
                url: None,
            },
            updated_at: DateTime::<Utc>::default(),
            remote_updated_at: DateTime::<Utc>::default(),
            targets: BTreeMap::from([("claude".to_string(), LockTarget {
                path: PathBuf::from("/home/.claude/skills/pdf"),
                mode: TargetMode::Symlink,
                symlink_failed: false,
                installed_at: DateTime::<Utc>::default(),
            })]),
        }
    }

    #[test]
    fn missing_file_is_empty_lock_at_epoch() {
        let tmp = tempfile::tempdir().unwrap();
        let lock = LockStore::new(tmp.path().join("none.json")).read();
        assert_eq!(lock, InstallLock::default());
        assert_eq!(lock.updated_at.timestamp(), 0);
    }

    #[test]
    fn corrupt_or_foreign_version_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("lock.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(LockStore::new(&path).read().skills.is_empty());

        std::fs::write(
            &path,
            r#"{"version":99,"updated_at":"2024-01-01T00:00:00Z","skills":{}}"#,
        )
        .unwrap();
        assert_eq!(LockStore::new(&path).read(), InstallLock::default());
    }

    #[test]
    fn update_persists_and_stamps() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LockStore::new(tmp.path().join("nested/lock.json"));
        store
            .update(|lock| lock.skills.insert("pdf".into(), entry("skill-1")))
            .unwrap();

        let lock = store.read();
        assert_eq!(lock.version, LOCK_VERSION);
        assert!(lock.updated_at.timestamp() > 0);
        assert_eq!(lock.skills["pdf"], entry("skill-1"));
        assert_eq!(lock.find_by_skill_id("skill-1").unwrap().0, "pdf");
        assert!(lock.find_by_skill_id("skill-2").is_none());
        assert!(!tmp.path().join("nested/lock.json.tmp").exists());
    }
}
