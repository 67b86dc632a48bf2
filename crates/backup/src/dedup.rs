//! Collapse copies of the same skill found in several directories.

use std::{collections::HashMap, path::PathBuf};

use {
    serde::{Deserialize, Serialize},
    skillport_skills::{Candidate, SkillDraft, fingerprint},
};

/// One on-disk copy of a skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub path: PathBuf,
    pub parent_root: PathBuf,
    pub agent_label: String,
    pub cleanup_eligible: bool,
}

impl From<&Candidate> for Occurrence {
    fn from(candidate: &Candidate) -> Self {
        Self {
            path: candidate.path.clone(),
            parent_root: candidate.root.clone(),
            agent_label: candidate.label.clone(),
            cleanup_eligible: candidate.cleanup_eligible,
        }
    }
}

/// Every occurrence whose markdown body hashes to `fingerprint`.
#[derive(Debug, Clone)]
pub struct OccurrenceGroup {
    pub fingerprint: String,
    /// Draft of the first occurrence seen; its folder is the canonical path.
    pub canonical: SkillDraft,
    pub occurrences: Vec<Occurrence>,
}

/// Group drafts by body fingerprint, keeping traversal order: the first
/// occurrence of each body is canonical and groups are ordered by it.
pub fn group_by_fingerprint(
    entries: impl IntoIterator<Item = (Occurrence, SkillDraft)>,
) -> Vec<OccurrenceGroup> {
    let mut groups: Vec<OccurrenceGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (occurrence, draft) in entries {
        let digest = fingerprint(&draft.raw_markdown);
        match index.get(&digest) {
            Some(&i) => groups[i].occurrences.push(occurrence),
            None => {
                index.insert(digest.clone(), groups.len());
                groups.push(OccurrenceGroup {
                    fingerprint: digest,
                    canonical: draft,
                    occurrences: vec![occurrence],
                });
            },
        }
    }
    groups
}
