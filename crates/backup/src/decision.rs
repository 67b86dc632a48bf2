//! Create / update / skip for one local skill against the owned remote set.
//!
//! Rules are applied in order and the first match wins:
//!
//! 1. failed local validation: skip (low)
//! 2. case-insensitive slug match: one is update (high), several is skip (low)
//! 3. case-insensitive name match: one is update (medium), several is skip (low)
//! 4. otherwise: create (high)
//!
//! Ambiguity is always a skip. The function is pure; callers fetch the owned
//! set once and reuse it.

use {
    serde::{Deserialize, Serialize},
    skillport_remote::SkillSummary,
};

pub const REASON_INVALID: &str = "local folder validation failed";
pub const REASON_SLUG_MATCH: &str = "slug matches an existing skill";
pub const REASON_SLUG_AMBIGUOUS: &str = "multiple existing skills share this slug";
pub const REASON_NAME_MATCH: &str = "name matches an existing skill";
pub const REASON_NAME_AMBIGUOUS: &str = "multiple existing skills share this name";
pub const REASON_NEW: &str = "no matching skill found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// The identity fields of a skill the current user owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedSkill {
    pub id: String,
    pub slug: String,
    pub name: String,
}

impl From<&SkillSummary> for OwnedSkill {
    fn from(summary: &SkillSummary) -> Self {
        Self {
            id: summary.id.clone(),
            slug: summary.slug.clone(),
            name: summary.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub confidence: Confidence,
    pub reason: String,
    /// Set iff `action` is [`Action::Update`].
    pub target: Option<OwnedSkill>,
}

impl Decision {
    fn new(action: Action, confidence: Confidence, reason: &str, target: Option<&OwnedSkill>) -> Self {
        Self {
            action,
            confidence,
            reason: reason.to_string(),
            target: target.cloned(),
        }
    }

    fn skip(reason: &str) -> Self {
        Self::new(Action::Skip, Confidence::Low, reason, None)
    }
}

pub fn decide(name: &str, slug: &str, validation_ok: bool, owned: &[OwnedSkill]) -> Decision {
    if !validation_ok {
        return Decision::skip(REASON_INVALID);
    }

    let by_slug: Vec<&OwnedSkill> = owned
        .iter()
        .filter(|s| s.slug.eq_ignore_ascii_case(slug))
        .collect();
    match by_slug.as_slice() {
        [one] => return Decision::new(Action::Update, Confidence::High, REASON_SLUG_MATCH, Some(*one)),
        [] => {},
        _ => return Decision::skip(REASON_SLUG_AMBIGUOUS),
    }

    let name = name.trim();
    let by_name: Vec<&OwnedSkill> = owned
        .iter()
        .filter(|s| !name.is_empty() && s.name.trim().eq_ignore_ascii_case(name))
        .collect();
    match by_name.as_slice() {
        [one] => Decision::new(Action::Update, Confidence::Medium, REASON_NAME_MATCH, Some(*one)),
        [] => Decision::new(Action::Create, Confidence::High, REASON_NEW, None),
        _ => Decision::skip(REASON_NAME_AMBIGUOUS),
    }
}
