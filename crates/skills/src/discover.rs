//! Find local skill folders that are not yet managed by the installer.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use {
    serde::{Deserialize, Serialize},
    skillport_common::paths::resolve,
    tracing::debug,
};

use crate::{marker::has_marker, parse::SKILL_FILE};

/// Reason recorded for folders left to the installer.
pub const MANAGED_REASON: &str = "managed by skillport install";

/// One directory to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRoot {
    pub path: PathBuf,
    /// Display label (agent id, `workspace`, or `custom`).
    pub label: String,
    /// Whether folders found here may be deleted after a successful backup.
    pub cleanup_eligible: bool,
    /// Whether the root itself may be a skill folder.
    pub include_self: bool,
}

impl DiscoveryRoot {
    /// A well-known agent directory: children only, cleanup allowed.
    pub fn agent(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
            cleanup_eligible: true,
            include_self: false,
        }
    }

    /// A user-chosen directory: root and children, never cleaned up.
    pub fn custom(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            label: "custom".into(),
            cleanup_eligible: false,
            include_self: true,
        }
    }
}

/// A folder holding a `SKILL.md`, tagged with the root it was found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub root: PathBuf,
    pub label: String,
    pub cleanup_eligible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFolder {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    pub candidates: Vec<Candidate>,
    pub skipped: Vec<SkippedFolder>,
}

/// Whether `folder` holds a primary document.
pub fn is_skill_folder(folder: &Path) -> bool {
    folder.join(SKILL_FILE).is_file()
}

/// Scan `roots` in order. Children are visited in name order and hidden
/// directories are ignored. A folder reachable from two roots is reported
/// once, under the first. Missing or unreadable roots yield nothing.
pub fn discover(roots: &[DiscoveryRoot]) -> Discovery {
    let mut out = Discovery::default();
    let mut seen = HashSet::new();

    for root in roots {
        let mut folders = Vec::new();
        if root.include_self {
            folders.push(root.path.clone());
        }
        match std::fs::read_dir(&root.path) {
            Ok(entries) => {
                let mut children: Vec<PathBuf> = entries
                    .flatten()
                    .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
                    .map(|e| e.path())
                    .filter(|p| p.is_dir())
                    .collect();
                children.sort();
                folders.extend(children);
            },
            Err(e) => {
                debug!(root = %root.path.display(), error = %e, "skipping unreadable root");
                continue;
            },
        }

        for folder in folders {
            if !is_skill_folder(&folder) || !seen.insert(resolve(&folder)) {
                continue;
            }
            if has_marker(&folder) {
                out.skipped.push(SkippedFolder {
                    path: folder,
                    reason: MANAGED_REASON.into(),
                });
                continue;
            }
            out.candidates.push(Candidate {
                path: folder,
                root: root.path.clone(),
                label: root.label.clone(),
                cleanup_eligible: root.cleanup_eligible,
            });
        }
    }

    if !out.skipped.is_empty() {
        debug!(count = out.skipped.len(), "skipped installer-managed folders");
    }
    debug!(candidates = out.candidates.len(), "discovery finished");
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::marker::MARKER_FILE};

    fn skill(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(SKILL_FILE), "---\ndescription: d\n---\nbody").unwrap();
    }

    #[test]
    fn children_in_name_order_with_root_tags() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("claude");
        skill(&root.join("zeta"));
        skill(&root.join("alpha"));
        skill(&root.join(".hidden"));
        std::fs::create_dir_all(root.join("not-a-skill")).unwrap();

        let found = discover(&[DiscoveryRoot::agent("claude", &root)]);
        let names: Vec<_> = found
            .candidates
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(found.candidates.iter().all(|c| c.cleanup_eligible && c.label == "claude"));
        assert!(found.skipped.is_empty());
    }

    #[test]
    fn custom_root_includes_itself_and_is_not_cleanup_eligible() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("mine");
        skill(&root);
        skill(&root.join("child"));

        let found = discover(&[DiscoveryRoot::custom(&root)]);
        assert_eq!(found.candidates.len(), 2);
        assert_eq!(found.candidates[0].path, root);
        assert!(found.candidates.iter().all(|c| !c.cleanup_eligible));
    }

    #[test]
    fn marked_folders_are_skipped_with_reason() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("codex");
        skill(&root.join("installed"));
        std::fs::write(root.join("installed").join(MARKER_FILE), "{}").unwrap();

        let found = discover(&[DiscoveryRoot::agent("codex", &root)]);
        assert!(found.candidates.is_empty());
        assert_eq!(found.skipped.len(), 1);
        assert_eq!(found.skipped[0].reason, MANAGED_REASON);
    }

    #[test]
    fn missing_root_is_empty_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let found = discover(&[DiscoveryRoot::agent("gemini", tmp.path().join("absent"))]);
        assert_eq!(found, Discovery::default());
    }

    #[test]
    fn overlapping_roots_report_a_folder_once() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("skills");
        skill(&root.join("one"));

        let found = discover(&[
            DiscoveryRoot::agent("claude", &root),
            DiscoveryRoot::agent("cursor", &root),
        ]);
        assert_eq!(found.candidates.len(), 1);
        assert_eq!(found.candidates[0].label, "claude");
    }
}
