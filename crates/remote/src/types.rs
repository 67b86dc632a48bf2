use std::collections::BTreeMap;

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

/// Who can see a skill in the remote store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Private => write!(f, "private"),
            Self::Public => write!(f, "public"),
        }
    }
}

/// Resource category, inferred from the top-level directory a file sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Reference,
    Script,
    Asset,
    Other,
}

impl ResourceKind {
    /// `references/x.md` → `Reference`, `scripts/run.sh` → `Script`,
    /// `assets/logo.svg` → `Asset`, anything else → `Other`.
    pub fn from_path(path: &str) -> Self {
        let parent = match path.split_once('/') {
            Some((first, _)) => first.to_ascii_lowercase(),
            None => return Self::Other,
        };
        match parent.as_str() {
            "reference" | "references" => Self::Reference,
            "script" | "scripts" => Self::Script,
            "asset" | "assets" => Self::Asset,
            _ => Self::Other,
        }
    }
}

/// A resource file as submitted to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInput {
    /// Slash-separated path relative to the skill folder.
    pub path: String,
    pub kind: ResourceKind,
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// A resource as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResource {
    pub id: String,
    pub path: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// Full remote skill record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSkill {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub frontmatter: Map<String, Value>,
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub resources: Vec<RemoteResource>,
    pub updated_at: DateTime<Utc>,
    /// Provenance (upstream repo URL or registry identifier), if any.
    #[serde(default)]
    pub source_url: Option<String>,
}

impl RemoteSkill {
    pub fn summary(&self) -> SkillSummary {
        SkillSummary {
            id: self.id.clone(),
            slug: self.slug.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            visibility: self.visibility,
            updated_at: self.updated_at,
        }
    }
}

/// Listing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSummary {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visibility: Visibility,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillInput {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub visibility: Visibility,
    pub frontmatter: Map<String, Value>,
    pub markdown: String,
    pub resources: Vec<ResourceInput>,
}

/// One change to a skill's resource list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ResourceChange {
    /// Update the resource with `id`, or insert a new one when `id` is `None`.
    Upsert {
        #[serde(default)]
        id: Option<String>,
        #[serde(flatten)]
        resource: ResourceInput,
    },
    Delete { id: String },
}

/// Partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontmatter: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<ResourceChange>>,
}

impl SkillPatch {
    /// A patch that only replaces the markdown body.
    pub fn markdown(markdown: impl Into<String>) -> Self {
        Self {
            markdown: Some(markdown.into()),
            ..Self::default()
        }
    }
}

/// Listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
    /// Only skills owned by the current identity.
    pub owned_only: bool,
    pub visibility: Option<Visibility>,
}

impl ListFilter {
    pub fn owned() -> Self {
        Self {
            owned_only: true,
            visibility: None,
        }
    }

    pub fn owned_private() -> Self {
        Self {
            owned_only: true,
            visibility: Some(Visibility::Private),
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillPage {
    pub items: Vec<SkillSummary>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_parent_directory() {
        assert_eq!(ResourceKind::from_path("references/api.md"), ResourceKind::Reference);
        assert_eq!(ResourceKind::from_path("Scripts/run.sh"), ResourceKind::Script);
        assert_eq!(ResourceKind::from_path("assets/img/logo.png"), ResourceKind::Asset);
        assert_eq!(ResourceKind::from_path("notes/todo.md"), ResourceKind::Other);
        assert_eq!(ResourceKind::from_path("README.md"), ResourceKind::Other);
    }

    #[test]
    fn resource_change_wire_shape() {
        let change = ResourceChange::Upsert {
            id: None,
            resource: ResourceInput {
                path: "scripts/run.sh".into(),
                kind: ResourceKind::Script,
                content: "echo".into(),
                metadata: BTreeMap::new(),
            },
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["op"], "upsert");
        assert_eq!(json["path"], "scripts/run.sh");
        assert_eq!(json["kind"], "script");

        let delete: ResourceChange =
            serde_json::from_str(r#"{"op":"delete","id":"r-1"}"#).unwrap();
        assert_eq!(delete, ResourceChange::Delete { id: "r-1".into() });
    }

    #[test]
    fn empty_patch_serializes_to_empty_object() {
        let json = serde_json::to_string(&SkillPatch::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
