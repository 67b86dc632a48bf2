//! Apply results: per item and aggregated.

use std::path::PathBuf;

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStatus {
    Created,
    Updated,
    Skipped,
    Failed,
}

impl std::fmt::Display for ApplyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupApplyItemResult {
    /// Plan item id (body fingerprint).
    pub item_id: String,
    pub name: String,
    pub status: ApplyStatus,
    /// Set whenever a remote record exists for the item, even on failure.
    pub remote_skill_id: Option<String>,
    pub remote_skill_slug: Option<String>,
    pub snapshot_path: Option<PathBuf>,
    pub message: Option<String>,
}

impl BackupApplyItemResult {
    pub fn new(item_id: &str, name: &str, status: ApplyStatus) -> Self {
        Self {
            item_id: item_id.to_string(),
            name: name.to_string(),
            status,
            remote_skill_id: None,
            remote_skill_slug: None,
            snapshot_path: None,
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The mutation reached the remote store.
    pub fn succeeded(&self) -> bool {
        matches!(self.status, ApplyStatus::Created | ApplyStatus::Updated)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyCounts {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ApplyCounts {
    pub fn tally(items: &[BackupApplyItemResult]) -> Self {
        let mut counts = Self::default();
        for item in items {
            match item.status {
                ApplyStatus::Created => counts.created += 1,
                ApplyStatus::Updated => counts.updated += 1,
                ApplyStatus::Skipped => counts.skipped += 1,
                ApplyStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupApplyResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub snapshot_dir: PathBuf,
    /// Whether `snapshot_dir` was left on disk.
    pub snapshot_kept: bool,
    pub items: Vec<BackupApplyItemResult>,
    pub counts: ApplyCounts,
    pub removed_folders: Vec<PathBuf>,
    pub warnings: Vec<String>,
}
