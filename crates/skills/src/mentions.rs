//! Resource mentions inside a skill's markdown.
//!
//! A mention is a markdown link (or image) whose target points at one of the
//! skill's own resource files:
//!
//! ```text
//! See [the API notes](references/api.md) and run ![diagram](assets/flow.png).
//! ```
//!
//! Before the store knows the resource ids the link is *unresolved*. Once the
//! resources exist remotely the target becomes `skill-resource:<id>`, which is
//! *resolved*. Links are found with `pulldown-cmark`, so code blocks, code
//! spans and escapes follow CommonMark and reference-style links count too.
//! Everything outside a mention is kept byte for byte.

use std::{
    collections::{BTreeMap, BTreeSet},
    ops::Range,
};

use {
    pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd},
    skillport_common::paths::normalize_relative,
};

use crate::parse::SKILL_FILE;

/// Link-target prefix of a resolved mention.
pub const RESOLVED_SCHEME: &str = "skill-resource:";

/// One piece of parsed markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Unresolved {
        label: String,
        /// Normalized resource path.
        path: String,
        /// The link exactly as written.
        source: String,
        image: bool,
    },
    Resolved {
        label: String,
        id: String,
        source: String,
        image: bool,
    },
}

impl Segment {
    /// A resolved mention written as an inline link.
    pub fn resolved(label: String, id: String, image: bool) -> Self {
        let bang = if image { "!" } else { "" };
        let source = format!("{bang}[{label}]({RESOLVED_SCHEME}{id})");
        Self::Resolved {
            label,
            id,
            source,
            image,
        }
    }

    fn text(&self) -> &str {
        match self {
            Self::Literal(text) => text,
            Self::Unresolved { source, .. } | Self::Resolved { source, .. } => source,
        }
    }
}

/// Outcome of [`resolve_to_ids`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub markdown: String,
    /// Mentioned paths that had no id; their links are left unresolved.
    pub missing_paths: Vec<String>,
}

/// An outermost link or image whose closing event has not been seen yet.
struct OpenLink {
    range: Range<usize>,
    dest: String,
    link_type: LinkType,
    image: bool,
    label: Option<Range<usize>>,
    depth: usize,
}

fn parser_options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TABLES);
    opts
}

/// Split markdown into literal text and mentions.
pub fn parse(markdown: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    let mut open: Option<OpenLink> = None;

    for (event, range) in Parser::new_ext(markdown, parser_options()).into_offset_iter() {
        if let Some(link) = open.as_mut() {
            match &event {
                Event::Start(Tag::Link { .. } | Tag::Image { .. }) => link.depth += 1,
                Event::End(TagEnd::Link | TagEnd::Image) => link.depth -= 1,
                _ => {},
            }
            if link.depth > 0 {
                link.label = Some(match link.label.take() {
                    Some(label) => label.start.min(range.start)..label.end.max(range.end),
                    None => range,
                });
                continue;
            }

            if let Some(link) = open.take()
                && let Some(segment) = classify(markdown, &link)
            {
                if link.range.start > cursor {
                    segments.push(Segment::Literal(markdown[cursor..link.range.start].to_string()));
                }
                segments.push(segment);
                cursor = link.range.end;
            }
            continue;
        }

        let (link_type, dest, image) = match event {
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                ..
            }) => (link_type, dest_url, false),
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                ..
            }) => (link_type, dest_url, true),
            _ => continue,
        };
        open = Some(OpenLink {
            range,
            dest: dest.to_string(),
            link_type,
            image,
            label: None,
            depth: 1,
        });
    }

    if cursor < markdown.len() {
        segments.push(Segment::Literal(markdown[cursor..].to_string()));
    }
    segments
}

/// Render segments back to markdown.
pub fn render(segments: &[Segment]) -> String {
    segments.iter().map(Segment::text).collect()
}

/// Unique unresolved resource paths, in order of first appearance.
pub fn collect_unresolved_paths(markdown: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    parse(markdown)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Unresolved { path, .. } => seen.insert(path.clone()).then_some(path),
            _ => None,
        })
        .collect()
}

/// Replace every unresolved mention with its plain label so the first write
/// to the store never carries a link to a resource id that does not exist yet.
pub fn strip_for_first_submission(markdown: &str) -> String {
    let segments: Vec<Segment> = parse(markdown)
        .into_iter()
        .map(|segment| match segment {
            Segment::Unresolved { label, path, .. } => {
                Segment::Literal(if label.trim().is_empty() { path } else { label })
            },
            other => other,
        })
        .collect();
    render(&segments)
}

/// Rewrite unresolved mentions whose path appears in `path_to_id`.
pub fn resolve_to_ids(markdown: &str, path_to_id: &BTreeMap<String, String>) -> Resolution {
    let mut missing = Vec::new();
    let segments: Vec<Segment> = parse(markdown)
        .into_iter()
        .map(|segment| match segment {
            Segment::Unresolved {
                label,
                path,
                source,
                image,
            } => match path_to_id.get(&path) {
                Some(id) => Segment::resolved(label, id.clone(), image),
                None => {
                    if !missing.contains(&path) {
                        missing.push(path.clone());
                    }
                    Segment::Unresolved {
                        label,
                        path,
                        source,
                        image,
                    }
                },
            },
            other => other,
        })
        .collect();

    Resolution {
        markdown: render(&segments),
        missing_paths: missing,
    }
}

fn classify(markdown: &str, link: &OpenLink) -> Option<Segment> {
    if matches!(link.link_type, LinkType::Autolink | LinkType::Email) {
        return None;
    }

    let label = link
        .label
        .clone()
        .map(|range| markdown[range].to_string())
        .unwrap_or_default();
    let source = markdown[link.range.clone()].to_string();
    let target = link.dest.trim();

    if let Some(id) = target.strip_prefix(RESOLVED_SCHEME) {
        return (!id.is_empty()).then(|| Segment::Resolved {
            label,
            id: id.to_string(),
            source,
            image: link.image,
        });
    }

    if target.is_empty()
        || target.contains(char::is_whitespace)
        || target.starts_with(['#', '/', '?'])
        || target.contains("://")
    {
        return None;
    }

    let without_fragment = target.split(['#', '?']).next().unwrap_or_default();
    let path = normalize_relative(without_fragment)?;
    if path.eq_ignore_ascii_case(SKILL_FILE) {
        return None;
    }

    Some(Segment::Unresolved {
        label,
        path,
        source,
        image: link.image,
    })
}
