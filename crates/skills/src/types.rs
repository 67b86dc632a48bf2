use std::path::PathBuf;

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    skillport_remote::{ResourceInput, SkillInput, Visibility},
};

/// A skill folder loaded into memory, ready to be planned or submitted.
#[derive(Debug, Clone)]
pub struct SkillDraft {
    /// Folder the draft was read from.
    pub folder: PathBuf,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub frontmatter: Map<String, Value>,
    /// Markdown body as written on disk (front matter excluded).
    pub raw_markdown: String,
    pub resources: Vec<ResourceInput>,
    /// Files present in the folder but left out of `resources` (too large,
    /// not text, unreadable). Their remote copies must not be treated as gone.
    pub skipped_resources: Vec<String>,
    /// Resource paths mentioned by the body but not yet bound to remote ids.
    pub new_resource_mention_paths: Vec<String>,
    /// `raw_markdown` with unresolved mentions replaced by plain text.
    pub markdown_for_mutation: String,
    pub validation: ValidationSummary,
}

impl SkillDraft {
    /// Fields for creating this draft as a new remote skill.
    pub fn to_input(&self, slug: &str, visibility: Visibility) -> SkillInput {
        SkillInput {
            slug: slug.to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            visibility,
            frontmatter: self.frontmatter.clone(),
            markdown: self.markdown_for_mutation.clone(),
            resources: self.resources.clone(),
        }
    }

    pub fn mention_summary(&self) -> MentionSummary {
        let missing = self
            .new_resource_mention_paths
            .iter()
            .filter(|p| !self.resources.iter().any(|r| &r.path == *p))
            .count();
        MentionSummary {
            total: self.new_resource_mention_paths.len(),
            missing,
        }
    }
}

/// Local checks run on every draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub ok: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ValidationSummary {
    pub fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            ok: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// How many resource mentions a draft carries and how many point nowhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionSummary {
    pub total: usize,
    pub missing: usize,
}
