use std::collections::HashSet;

use {async_trait::async_trait, tracing::debug};

use crate::{
    error::{RemoteError, Result},
    types::{ListFilter, RemoteSkill, SkillInput, SkillPage, SkillPatch, SkillSummary},
};

/// The remote skill store as seen by the local engine.
#[async_trait]
pub trait SkillRepository: Send + Sync {
    /// Identifies the server in install provenance (usually its base URL).
    fn server_identity(&self) -> String;

    async fn create(&self, input: SkillInput) -> Result<RemoteSkill>;

    async fn update(&self, id: &str, patch: SkillPatch) -> Result<RemoteSkill>;

    async fn get_by_id(&self, id: &str) -> Result<RemoteSkill>;

    /// One page of skills. Pass the previous page's `next_cursor` to continue.
    async fn list(&self, filter: &ListFilter, cursor: Option<&str>) -> Result<SkillPage>;
}

/// Drain every page of a listing.
///
/// Anything that needs a complete view (ownership sets, prune decisions) must
/// go through this rather than a single `list` call.
pub async fn list_all(
    repo: &dyn SkillRepository,
    filter: &ListFilter,
) -> Result<Vec<SkillSummary>> {
    let mut items = Vec::new();
    let mut seen_cursors = HashSet::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = repo.list(filter, cursor.as_deref()).await?;
        items.extend(page.items);
        match page.next_cursor {
            Some(next) => {
                if !seen_cursors.insert(next.clone()) {
                    return Err(RemoteError::message(format!(
                        "listing cursor '{next}' repeated; refusing to loop"
                    )));
                }
                cursor = Some(next);
            },
            None => break,
        }
    }

    debug!(count = items.len(), "drained skill listing");
    Ok(items)
}
