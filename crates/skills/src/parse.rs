use {
    serde_json::{Map, Value},
    skillport_common::FromMessage,
};

use crate::error::{Error, Result};

/// Primary document of every skill folder.
pub const SKILL_FILE: &str = "SKILL.md";

/// Longest folder name / slug the installer will produce.
pub const MAX_SLUG_LEN: usize = 64;

/// Used when a slug sanitizes down to nothing.
pub const FALLBACK_SLUG: &str = "skill";

/// A `SKILL.md` split into its front matter and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillDocument {
    /// Keys in the order they were written.
    pub frontmatter: Map<String, Value>,
    /// Body with leading and trailing whitespace trimmed. Fingerprints are
    /// taken over this form, so trailing newlines never split a group.
    pub body: String,
}

impl SkillDocument {
    pub fn string_field(&self, key: &str) -> Option<&str> {
        self.frontmatter
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Parse a `SKILL.md`. Documents without a leading `---` have an empty front
/// matter and the whole text as body; malformed YAML is an error.
pub fn parse_document(content: &str) -> Result<SkillDocument> {
    let Some((frontmatter, body)) = split_frontmatter(content)? else {
        return Ok(SkillDocument {
            frontmatter: Map::new(),
            body: content.trim().to_string(),
        });
    };

    let frontmatter = if frontmatter.trim().is_empty() {
        Map::new()
    } else {
        match serde_yaml::from_str::<Value>(&frontmatter)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(Error::from_message(
                    "SKILL.md front matter must be a mapping".into(),
                ));
            },
        }
    };

    Ok(SkillDocument { frontmatter, body })
}

/// Render front matter and body back into `SKILL.md` text.
pub fn render_document(frontmatter: &Map<String, Value>, body: &str) -> Result<String> {
    let mut out = String::from("---\n");
    if !frontmatter.is_empty() {
        out.push_str(&serde_yaml::to_string(frontmatter)?);
    }
    out.push_str("---\n\n");
    out.push_str(body.trim());
    out.push('\n');
    Ok(out)
}

/// Split SKILL.md content at `---` delimiters into (frontmatter, body).
/// Returns `None` when the document has no front matter at all.
fn split_frontmatter(content: &str) -> Result<Option<(String, String)>> {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    if !trimmed.starts_with("---") {
        return Ok(None);
    }

    // Skip the opening ---
    let after_open = &trimmed[3..];
    let close_pos = after_open.find("\n---").ok_or_else(|| {
        Error::from_message("SKILL.md missing closing --- for frontmatter".into())
    })?;

    let frontmatter = after_open[..close_pos].trim().to_string();
    let rest = &after_open[close_pos + 4..];
    // Drop the remainder of the closing delimiter line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    Ok(Some((frontmatter, body.trim().to_string())))
}

/// Reduce arbitrary text to a folder-safe slug: lowercase ASCII letters,
/// digits, dots and hyphens, no leading/trailing separators, at most
/// [`MAX_SLUG_LEN`] chars, never empty.
pub fn sanitize_slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;
    for ch in raw.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '.' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch);
        } else {
            pending_dash = true;
        }
    }

    let mut slug: String = out
        .trim_matches(|c| c == '.' || c == '-')
        .chars()
        .take(MAX_SLUG_LEN)
        .collect();
    while slug.ends_with(['.', '-']) {
        slug.pop();
    }
    if slug.is_empty() || slug.chars().all(|c| c == '.') {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frontmatter_and_body() {
        let content = r#"---
name: commit
description: Create git commits
tags: [git, vcs]
---

When asked to commit, run `git add` then `git commit`.
"#;
        let doc = parse_document(content).unwrap();
        assert_eq!(doc.string_field("name"), Some("commit"));
        assert_eq!(doc.string_field("description"), Some("Create git commits"));
        assert_eq!(doc.frontmatter["tags"], serde_json::json!(["git", "vcs"]));
        assert_eq!(
            doc.body,
            "When asked to commit, run `git add` then `git commit`."
        );
    }

    #[test]
    fn document_without_frontmatter_is_all_body() {
        let doc = parse_document("# Title\nJust markdown.").unwrap();
        assert!(doc.frontmatter.is_empty());
        assert_eq!(doc.body, "# Title\nJust markdown.");
    }

    #[test]
    fn missing_closing_delimiter_is_an_error() {
        assert!(parse_document("---\nname: test\nno closing\n").is_err());
    }

    #[test]
    fn scalar_frontmatter_is_an_error() {
        assert!(parse_document("---\njust a string\n---\nbody").is_err());
    }

    #[test]
    fn empty_frontmatter_block() {
        let doc = parse_document("---\n---\nbody").unwrap();
        assert!(doc.frontmatter.is_empty());
        assert_eq!(doc.body, "body");
    }

    #[test]
    fn render_then_parse_keeps_fields() {
        let mut fm = Map::new();
        fm.insert("name".into(), "demo".into());
        fm.insert("description".into(), "Demo skill".into());
        let text = render_document(&fm, "Do the thing.\n").unwrap();
        assert!(text.starts_with("---\n"));
        let doc = parse_document(&text).unwrap();
        assert_eq!(doc.frontmatter, fm);
        assert_eq!(doc.body, "Do the thing.");
    }

    #[test]
    fn frontmatter_keeps_written_key_order() {
        let doc = parse_document("---\nname: demo\ndescription: d\nallowed-tools: [Read]\nauthor: me\n---\nbody")
            .unwrap();
        let keys: Vec<&str> = doc.frontmatter.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "description", "allowed-tools", "author"]);

        let text = render_document(&doc.frontmatter, &doc.body).unwrap();
        let name_at = text.find("name:").unwrap();
        let author_at = text.find("author:").unwrap();
        assert!(name_at < author_at);
    }

    #[test]
    fn sanitize_slug_rules() {
        assert_eq!(sanitize_slug("My Skill!"), "my-skill");
        assert_eq!(sanitize_slug("  PDF   Tools v2.1 "), "pdf-tools-v2.1");
        assert_eq!(sanitize_slug("../../etc"), "etc");
        assert_eq!(sanitize_slug("!!!"), "skill");
        assert_eq!(sanitize_slug(""), "skill");
        assert_eq!(sanitize_slug("..."), "skill");
        assert_eq!(sanitize_slug("Ünïcode Name"), "n-code-name");
        assert_eq!(sanitize_slug(&"a".repeat(100)).len(), MAX_SLUG_LEN);
        let slug = sanitize_slug("Hello/World_2024");
        assert_eq!(slug, "hello-world-2024");
        assert!(
            slug.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
        );
    }
}
