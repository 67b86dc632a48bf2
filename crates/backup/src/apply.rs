//! Execute a backup plan against the remote store.

use std::collections::{BTreeMap, HashSet};

use {
    chrono::Utc,
    skillport_common::paths::normalize_relative,
    skillport_remote::{
        RemoteResource, RemoteSkill, ResourceChange, ResourceInput, SkillPatch, SkillRepository,
        Visibility,
    },
    skillport_skills::{SkillDraft, mentions, read_skill_folder},
    tracing::{info, warn},
};

use crate::{
    cleanup,
    decision::Action,
    error::{Error, Result},
    plan::{BackupPlan, BackupPlanItem},
    report::{ApplyCounts, ApplyStatus, BackupApplyItemResult, BackupApplyResult},
    snapshot::SnapshotManager,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Leave the snapshot directory in place even when nothing failed.
    pub keep_snapshot: bool,
    /// Remove backed-up local folders afterwards.
    pub cleanup: bool,
    /// Suffixed slugs to try after the planned slug is taken.
    pub slug_conflict_retries: u32,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            keep_snapshot: false,
            cleanup: true,
            slug_conflict_retries: 5,
        }
    }
}

impl From<&skillport_config::BackupConfig> for ApplyOptions {
    fn from(config: &skillport_config::BackupConfig) -> Self {
        Self {
            keep_snapshot: config.keep_snapshots,
            cleanup: config.cleanup,
            slug_conflict_retries: config.slug_conflict_retries,
        }
    }
}

/// A remote mutation that succeeded, possibly followed by a failure.
struct Applied {
    skill: RemoteSkill,
    status: ApplyStatus,
    follow_up_error: Option<String>,
}

/// Apply every item in plan order. Each item is isolated: a failure is
/// recorded and the run moves on.
pub async fn apply(
    repo: &dyn SkillRepository,
    plan: &BackupPlan,
    snapshots: &SnapshotManager,
    options: ApplyOptions,
) -> BackupApplyResult {
    let started_at = Utc::now();
    let mut items = Vec::with_capacity(plan.items.len());

    for (index, item) in plan.items.iter().enumerate() {
        items.push(apply_item(repo, item, index, snapshots, options).await);
    }

    let mut warnings = Vec::new();
    let mut removed_folders = Vec::new();
    if options.cleanup {
        let report = cleanup::prune(plan, &items);
        removed_folders = report.removed;
        warnings.extend(report.warnings);
    }

    let counts = ApplyCounts::tally(&items);
    let mut snapshot_kept = true;
    if counts.failed == 0 && !options.keep_snapshot {
        match snapshots.remove() {
            Ok(_) => snapshot_kept = false,
            Err(e) => warnings.push(format!(
                "failed to remove snapshot {}: {e}",
                snapshots.root().display()
            )),
        }
    }

    info!(
        created = counts.created,
        updated = counts.updated,
        skipped = counts.skipped,
        failed = counts.failed,
        removed = removed_folders.len(),
        "applied backup plan"
    );

    BackupApplyResult {
        started_at,
        finished_at: Utc::now(),
        snapshot_dir: snapshots.root().to_path_buf(),
        snapshot_kept,
        items,
        counts,
        removed_folders,
        warnings,
    }
}

async fn apply_item(
    repo: &dyn SkillRepository,
    item: &BackupPlanItem,
    index: usize,
    snapshots: &SnapshotManager,
    options: ApplyOptions,
) -> BackupApplyItemResult {
    let failed = |message: String| {
        warn!(name = %item.name, %message, "backup item failed");
        BackupApplyItemResult::new(&item.id, &item.name, ApplyStatus::Failed).with_message(message)
    };

    let target = match (item.action, item.target_skill_id.as_deref()) {
        (Action::Skip, _) => {
            return BackupApplyItemResult::new(&item.id, &item.name, ApplyStatus::Skipped)
                .with_message(item.reason.clone());
        },
        (Action::Update, None) => return failed("update item has no target skill id".into()),
        (Action::Update, Some(id)) => Some(id),
        (Action::Create, _) => None,
    };

    let snapshot_path = match snapshots.take(index, &item.slug, &item.canonical_path) {
        Ok(path) => path,
        Err(e) => return failed(format!("snapshot failed: {e}")),
    };
    let with_snapshot = |mut result: BackupApplyItemResult| {
        result.snapshot_path = Some(snapshot_path.clone());
        result
    };

    let draft = match read_snapshot(&snapshot_path) {
        Ok(draft) => draft,
        Err(e) => return with_snapshot(failed(e.to_string())),
    };

    let applied = match target {
        Some(id) => update_skill(repo, id, &draft).await,
        None => create_skill(repo, &draft, &item.slug, options.slug_conflict_retries).await,
    };
    let applied = match applied {
        Ok(applied) => applied,
        Err(e) => return with_snapshot(failed(e.to_string())),
    };

    let mut result = BackupApplyItemResult::new(&item.id, &item.name, applied.status);
    result.remote_skill_id = Some(applied.skill.id.clone());
    result.remote_skill_slug = Some(applied.skill.slug.clone());
    if let Some(error) = applied.follow_up_error {
        warn!(name = %item.name, id = %applied.skill.id, %error, "mention follow-up failed");
        result.status = ApplyStatus::Failed;
        result.message = Some(format!(
            "{} skill {} but mention follow-up failed: {error}",
            applied.status, applied.skill.id
        ));
    }
    with_snapshot(result)
}

fn read_snapshot(path: &std::path::Path) -> Result<SkillDraft> {
    let draft = read_skill_folder(path)?;
    if !draft.validation.ok {
        return Err(Error::message(format!(
            "local folder validation failed: {}",
            draft.validation.errors.join("; ")
        )));
    }
    Ok(draft)
}

async fn create_skill(
    repo: &dyn SkillRepository,
    draft: &SkillDraft,
    slug: &str,
    retries: u32,
) -> Result<Applied> {
    let mut attempt = 0;
    let created = loop {
        let candidate = if attempt == 0 {
            slug.to_string()
        } else {
            format!("{slug}-{}", attempt + 1)
        };
        match repo.create(draft.to_input(&candidate, Visibility::Private)).await {
            Ok(skill) => break skill,
            Err(e) if e.is_slug_conflict() && attempt < retries => {
                info!(slug = %candidate, "slug taken, retrying with suffix");
                attempt += 1;
            },
            Err(e) => return Err(e.into()),
        }
    };
    Ok(finish(repo, draft, created, ApplyStatus::Created).await)
}

async fn update_skill(repo: &dyn SkillRepository, id: &str, draft: &SkillDraft) -> Result<Applied> {
    let current = repo.get_by_id(id).await?;
    let patch = SkillPatch {
        name: Some(draft.name.clone()),
        description: Some(draft.description.clone()),
        frontmatter: Some(draft.frontmatter.clone()),
        markdown: Some(draft.markdown_for_mutation.clone()),
        resources: Some(diff_resources(
            &current.resources,
            &draft.resources,
            &draft.skipped_resources,
        )),
    };
    let updated = repo.update(id, patch).await?;
    Ok(finish(repo, draft, updated, ApplyStatus::Updated).await)
}

/// Resolve mentions against the ids the store just assigned and, when that
/// changes the markdown, send one more update.
async fn finish(
    repo: &dyn SkillRepository,
    draft: &SkillDraft,
    skill: RemoteSkill,
    status: ApplyStatus,
) -> Applied {
    let mut applied = Applied {
        skill,
        status,
        follow_up_error: None,
    };
    if draft.new_resource_mention_paths.is_empty() {
        return applied;
    }

    let path_to_id: BTreeMap<String, String> = applied
        .skill
        .resources
        .iter()
        .filter_map(|r| normalize_relative(&r.path).map(|p| (p, r.id.clone())))
        .collect();
    let resolution = mentions::resolve_to_ids(&draft.raw_markdown, &path_to_id);
    if !resolution.missing_paths.is_empty() {
        applied.follow_up_error = Some(format!(
            "no resource id for {}",
            resolution.missing_paths.join(", ")
        ));
        return applied;
    }
    if resolution.markdown == applied.skill.markdown {
        return applied;
    }

    match repo
        .update(&applied.skill.id, SkillPatch::markdown(resolution.markdown))
        .await
    {
        Ok(skill) => applied.skill = skill,
        Err(e) => applied.follow_up_error = Some(e.to_string()),
    }
    applied
}

/// Changes turning `remote` into `local`: matched paths are upserted with
/// their id, new paths are inserted, remote-only paths are deleted.
///
/// Paths in `skipped_locally` exist on disk but could not be read, so their
/// remote copies are left untouched.
pub fn diff_resources(
    remote: &[RemoteResource],
    local: &[ResourceInput],
    skipped_locally: &[String],
) -> Vec<ResourceChange> {
    let remote_by_path: BTreeMap<String, &RemoteResource> = remote
        .iter()
        .map(|r| (normalize_relative(&r.path).unwrap_or_else(|| r.path.clone()), r))
        .collect();
    let local_paths: HashSet<&str> = local.iter().map(|r| r.path.as_str()).collect();

    let mut changes: Vec<ResourceChange> = remote_by_path
        .iter()
        .filter(|(path, _)| {
            !local_paths.contains(path.as_str()) && !skipped_locally.iter().any(|s| s == *path)
        })
        .map(|(_, r)| ResourceChange::Delete { id: r.id.clone() })
        .collect();
    changes.extend(local.iter().map(|resource| ResourceChange::Upsert {
        id: remote_by_path.get(&resource.path).map(|r| r.id.clone()),
        resource: resource.clone(),
    }));
    changes
}
