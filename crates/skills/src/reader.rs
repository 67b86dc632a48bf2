//! Load one skill folder into a [`SkillDraft`].

use std::path::Path;

use {
    serde_json::Value,
    skillport_common::paths::normalize_relative,
    skillport_remote::{ResourceInput, ResourceKind},
    tracing::debug,
    walkdir::{DirEntry, WalkDir},
};

use crate::{
    error::{Error, Result},
    mentions,
    parse::{self, SKILL_FILE},
    types::{SkillDraft, ValidationSummary},
};

/// Resource files larger than this are left out of the draft.
pub const MAX_RESOURCE_BYTES: u64 = 1024 * 1024;

/// Read `folder/SKILL.md` plus every resource file next to it.
///
/// Only unreadable or unparsable `SKILL.md` files are errors. Problems that
/// make the skill unfit for upload (missing description, mentions of files
/// that do not exist) are recorded in the draft's [`ValidationSummary`].
pub fn read_skill_folder(folder: &Path) -> Result<SkillDraft> {
    let skill_md = folder.join(SKILL_FILE);
    let content = std::fs::read_to_string(&skill_md)
        .map_err(|e| Error::invalid_skill(folder, format!("cannot read {SKILL_FILE}: {e}")))?;
    let doc = parse::parse_document(&content).map_err(|e| Error::invalid_skill(folder, e.to_string()))?;

    let folder_name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| parse::FALLBACK_SLUG.to_string());
    let name = doc.string_field("name").unwrap_or(&folder_name).to_string();
    let slug = parse::sanitize_slug(doc.string_field("slug").unwrap_or(&folder_name));
    let description = doc.string_field("description").unwrap_or_default().to_string();

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let (resources, skipped_resources) = collect_resources(folder, &mut warnings);

    if description.is_empty() {
        errors.push("front matter is missing a description".to_string());
    }

    let mention_paths = mentions::collect_unresolved_paths(&doc.body);
    for path in &mention_paths {
        if !resources.iter().any(|r| &r.path == path) {
            errors.push(format!("mentions missing resource '{path}'"));
        }
    }

    debug!(
        folder = %folder.display(),
        %slug,
        resources = resources.len(),
        mentions = mention_paths.len(),
        "read skill folder"
    );

    Ok(SkillDraft {
        folder: folder.to_path_buf(),
        name,
        slug,
        description,
        frontmatter: doc.frontmatter,
        markdown_for_mutation: mentions::strip_for_first_submission(&doc.body),
        raw_markdown: doc.body,
        resources,
        skipped_resources,
        new_resource_mention_paths: mention_paths,
        validation: ValidationSummary::from_findings(errors, warnings),
    })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Readable text resources, plus the normalized paths of files that exist but
/// were left out.
fn collect_resources(
    folder: &Path,
    warnings: &mut Vec<String>,
) -> (Vec<ResourceInput>, Vec<String>) {
    let mut resources = Vec::new();
    let mut skipped = Vec::new();
    let walker = WalkDir::new(folder)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warnings.push(format!("skipped unreadable entry: {e}"));
                continue;
            },
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(folder) else {
            continue;
        };
        let Some(path) = normalize_relative(&relative.to_string_lossy()) else {
            warnings.push(format!("skipped resource with unusable path '{}'", relative.display()));
            continue;
        };
        if path == SKILL_FILE {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or_default();
        if size > MAX_RESOURCE_BYTES {
            warnings.push(format!("skipped resource '{path}': {size} bytes exceeds limit"));
            skipped.push(path);
            continue;
        }
        let content = match std::fs::read(entry.path()).map(String::from_utf8) {
            Ok(Ok(text)) => text,
            Ok(Err(_)) => {
                warnings.push(format!("skipped non-text resource '{path}'"));
                skipped.push(path);
                continue;
            },
            Err(e) => {
                warnings.push(format!("skipped unreadable resource '{path}': {e}"));
                skipped.push(path);
                continue;
            },
        };

        resources.push(ResourceInput {
            kind: ResourceKind::from_path(&path),
            metadata: [("size".to_string(), Value::from(size))].into_iter().collect(),
            path,
            content,
        });
    }
    (resources, skipped)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn reads_frontmatter_resources_and_mentions() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("pdf-tools");
        write(
            &dir.join("SKILL.md"),
            b"---\nname: PDF Tools\ndescription: Work with PDFs\n---\nRead [notes](references/notes.md) then run [it](scripts/run.sh).\n",
        );
        write(&dir.join("references/notes.md"), b"notes");
        write(&dir.join("scripts/run.sh"), b"#!/bin/sh\n");
        write(&dir.join(".git/config"), b"hidden");
        write(&dir.join(".skillport.json"), b"{}");

        let draft = read_skill_folder(&dir).unwrap();
        assert_eq!(draft.name, "PDF Tools");
        assert_eq!(draft.slug, "pdf-tools");
        assert_eq!(draft.description, "Work with PDFs");
        let paths: Vec<&str> = draft.resources.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["references/notes.md", "scripts/run.sh"]);
        assert_eq!(draft.resources[0].kind, ResourceKind::Reference);
        assert_eq!(draft.resources[1].kind, ResourceKind::Script);
        assert_eq!(draft.resources[0].metadata["size"], 5);
        assert_eq!(draft.new_resource_mention_paths, vec![
            "references/notes.md",
            "scripts/run.sh"
        ]);
        assert_eq!(draft.markdown_for_mutation, "Read notes then run it.");
        assert!(draft.validation.ok, "{:?}", draft.validation);
    }

    #[test]
    fn slug_from_frontmatter_wins_over_folder_name() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("Some Folder");
        write(
            &dir.join("SKILL.md"),
            b"---\nslug: Custom Slug\ndescription: d\n---\nbody",
        );
        let draft = read_skill_folder(&dir).unwrap();
        assert_eq!(draft.slug, "custom-slug");
        assert_eq!(draft.name, "Some Folder");
    }

    #[test]
    fn validation_flags_missing_description_and_dangling_mentions() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("broken");
        write(&dir.join("SKILL.md"), b"---\nname: broken\n---\nSee [x](references/x.md)");
        let draft = read_skill_folder(&dir).unwrap();
        assert!(!draft.validation.ok);
        assert_eq!(draft.validation.errors.len(), 2);
        assert_eq!(draft.mention_summary().missing, 1);
    }

    #[test]
    fn binary_resources_become_warnings() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("bin");
        write(&dir.join("SKILL.md"), b"---\ndescription: d\n---\nbody");
        write(&dir.join("assets/blob.bin"), &[0xff, 0xfe, 0x00]);
        let draft = read_skill_folder(&dir).unwrap();
        assert!(draft.resources.is_empty());
        assert!(draft.validation.ok);
        assert_eq!(draft.validation.warnings.len(), 1);
        assert_eq!(draft.skipped_resources, vec!["assets/blob.bin"]);
    }

    #[test]
    fn malformed_frontmatter_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("bad");
        write(&dir.join("SKILL.md"), b"---\nname: [unclosed\n---\nbody");
        assert!(matches!(
            read_skill_folder(&dir),
            Err(Error::InvalidSkill { .. })
        ));
    }
}
