//! In-process skill store.
//!
//! Enforces slug uniqueness, assigns sequential ids, and paginates listings,
//! which is everything the engine depends on. Timestamps come from a fake
//! clock that ticks one second per mutation so results are reproducible.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
};

use crate::{
    error::{RemoteError, Result},
    repository::SkillRepository,
    types::{
        ListFilter, RemoteResource, RemoteSkill, ResourceChange, SkillInput, SkillPage,
        SkillPatch, Visibility,
    },
};

/// Which operation an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Create,
    Update,
    GetById,
    List,
}

struct StoredSkill {
    skill: RemoteSkill,
    owned: bool,
}

#[derive(Default)]
struct State {
    skills: Vec<StoredSkill>,
    next_skill: u64,
    next_resource: u64,
    ticks: i64,
    failures: VecDeque<(FailOn, String)>,
    calls: Vec<FailOn>,
}

impl State {
    fn tick(&mut self) -> DateTime<Utc> {
        self.ticks += 1;
        DateTime::<Utc>::from_timestamp(self.ticks, 0).unwrap_or_default()
    }

    fn take_failure(&mut self, op: FailOn) -> Option<RemoteError> {
        self.calls.push(op);
        let pos = self.failures.iter().position(|(f, _)| *f == op)?;
        self.failures
            .remove(pos)
            .map(|(_, message)| RemoteError::message(message))
    }

    fn slug_taken(&self, slug: &str, except_id: Option<&str>) -> bool {
        self.skills.iter().any(|s| {
            s.skill.slug.eq_ignore_ascii_case(slug) && Some(s.skill.id.as_str()) != except_id
        })
    }

    fn new_resource_id(&mut self) -> String {
        self.next_resource += 1;
        format!("res-{}", self.next_resource)
    }
}

/// Skill store kept entirely in memory.
pub struct MemorySkillRepository {
    state: Mutex<State>,
    page_size: usize,
}

impl MemorySkillRepository {
    pub fn new() -> Self {
        Self::with_page_size(50)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: page_size.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next call of `op` fail with `message`.
    pub fn fail_next(&self, op: FailOn, message: impl Into<String>) {
        self.lock().failures.push_back((op, message.into()));
    }

    /// Seed a skill owned by someone else (visible in unfiltered listings only).
    pub fn insert_foreign(&self, input: SkillInput) -> RemoteSkill {
        let mut state = self.lock();
        let skill = build_skill(&mut state, input);
        state.skills.push(StoredSkill {
            skill: skill.clone(),
            owned: false,
        });
        skill
    }

    /// Delete a skill outright, as if it had been removed in the web UI.
    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.lock();
        let before = state.skills.len();
        state.skills.retain(|s| s.skill.id != id);
        state.skills.len() != before
    }

    /// Current copy of a skill, bypassing failure injection.
    pub fn snapshot(&self, id: &str) -> Option<RemoteSkill> {
        self.lock()
            .skills
            .iter()
            .find(|s| s.skill.id == id)
            .map(|s| s.skill.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Operations invoked so far, in call order.
    pub fn calls(&self) -> Vec<FailOn> {
        self.lock().calls.clone()
    }
}

impl Default for MemorySkillRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn build_skill(state: &mut State, input: SkillInput) -> RemoteSkill {
    state.next_skill += 1;
    let id = format!("skill-{}", state.next_skill);
    let resources = input
        .resources
        .into_iter()
        .map(|r| RemoteResource {
            id: state.new_resource_id(),
            path: r.path,
            kind: r.kind,
            content: r.content,
            metadata: r.metadata,
        })
        .collect();
    RemoteSkill {
        id,
        slug: input.slug,
        name: input.name,
        description: input.description,
        visibility: input.visibility,
        frontmatter: input.frontmatter,
        markdown: input.markdown,
        resources,
        updated_at: state.tick(),
        source_url: None,
    }
}

fn apply_resource_changes(
    state: &mut State,
    mut resources: Vec<RemoteResource>,
    changes: Vec<ResourceChange>,
) -> Result<Vec<RemoteResource>> {
    for change in changes {
        match change {
            ResourceChange::Delete { id } => {
                let before = resources.len();
                resources.retain(|r| r.id != id);
                if resources.len() == before {
                    return Err(RemoteError::NotFound { id });
                }
            },
            ResourceChange::Upsert {
                id: Some(id),
                resource,
            } => {
                let existing = resources
                    .iter_mut()
                    .find(|r| r.id == id)
                    .ok_or_else(|| RemoteError::NotFound { id: id.clone() })?;
                existing.path = resource.path;
                existing.kind = resource.kind;
                existing.content = resource.content;
                existing.metadata = resource.metadata;
            },
            ResourceChange::Upsert { id: None, resource } => {
                resources.push(RemoteResource {
                    id: state.new_resource_id(),
                    path: resource.path,
                    kind: resource.kind,
                    content: resource.content,
                    metadata: resource.metadata,
                });
            },
        }
    }
    Ok(resources)
}

#[async_trait]
impl SkillRepository for MemorySkillRepository {
    fn server_identity(&self) -> String {
        "memory".into()
    }

    async fn create(&self, input: SkillInput) -> Result<RemoteSkill> {
        let mut state = self.lock();
        if let Some(err) = state.take_failure(FailOn::Create) {
            return Err(err);
        }
        if state.slug_taken(&input.slug, None) {
            return Err(RemoteError::SlugConflict { slug: input.slug });
        }
        let skill = build_skill(&mut state, input);
        state.skills.push(StoredSkill {
            skill: skill.clone(),
            owned: true,
        });
        Ok(skill)
    }

    async fn update(&self, id: &str, patch: SkillPatch) -> Result<RemoteSkill> {
        let mut state = self.lock();
        if let Some(err) = state.take_failure(FailOn::Update) {
            return Err(err);
        }
        let index = state
            .skills
            .iter()
            .position(|s| s.skill.id == id)
            .ok_or_else(|| RemoteError::NotFound { id: id.to_string() })?;

        let mut skill = state.skills[index].skill.clone();
        if let Some(name) = patch.name {
            skill.name = name;
        }
        if let Some(description) = patch.description {
            skill.description = description;
        }
        if let Some(frontmatter) = patch.frontmatter {
            skill.frontmatter = frontmatter;
        }
        if let Some(markdown) = patch.markdown {
            skill.markdown = markdown;
        }
        if let Some(changes) = patch.resources {
            skill.resources = apply_resource_changes(&mut state, skill.resources, changes)?;
        }
        skill.updated_at = state.tick();
        state.skills[index].skill = skill.clone();
        Ok(skill)
    }

    async fn get_by_id(&self, id: &str) -> Result<RemoteSkill> {
        let mut state = self.lock();
        if let Some(err) = state.take_failure(FailOn::GetById) {
            return Err(err);
        }
        state
            .skills
            .iter()
            .find(|s| s.skill.id == id)
            .map(|s| s.skill.clone())
            .ok_or_else(|| RemoteError::NotFound { id: id.to_string() })
    }

    async fn list(&self, filter: &ListFilter, cursor: Option<&str>) -> Result<SkillPage> {
        let mut state = self.lock();
        if let Some(err) = state.take_failure(FailOn::List) {
            return Err(err);
        }
        let offset = match cursor {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| RemoteError::message(format!("invalid cursor '{raw}'")))?,
            None => 0,
        };
        let matching: Vec<_> = state
            .skills
            .iter()
            .filter(|s| !filter.owned_only || s.owned)
            .filter(|s| filter.visibility.is_none_or(|v| s.skill.visibility == v))
            .map(|s| s.skill.summary())
            .collect();
        let end = (offset + self.page_size).min(matching.len());
        let items = matching.get(offset..end).map(<[_]>::to_vec).unwrap_or_default();
        let next_cursor = (end < matching.len()).then(|| end.to_string());
        Ok(SkillPage { items, next_cursor })
    }
}

/// Convenience for tests: a private skill input with no resources.
pub fn private_input(slug: &str, name: &str, markdown: &str) -> SkillInput {
    SkillInput {
        slug: slug.into(),
        name: name.into(),
        description: format!("{name} description"),
        visibility: Visibility::Private,
        frontmatter: serde_json::Map::new(),
        markdown: markdown.into(),
        resources: Vec::new(),
    }
}
