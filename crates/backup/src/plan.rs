//! Backup plans: what would happen to every local skill, decided up front
//! and written to disk for review before anything is mutated.

use std::path::{Path, PathBuf};

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    skillport_remote::{ListFilter, SkillRepository, list_all},
    skillport_skills::{
        AgentDirs, DiscoveryRoot, MentionSummary, SkippedFolder, ValidationSummary, discover,
        read_skill_folder,
    },
    tracing::{debug, info},
};

use crate::{
    decision::{Action, Confidence, OwnedSkill, decide},
    dedup::{Occurrence, group_by_fingerprint},
    error::{Context, Error, Result},
};

pub const PLAN_VERSION: u32 = 1;

/// Agent targets are linked, falling back to copies.
pub const LINK_POLICY: &str = "symlink-or-copy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Every well-known agent directory plus the workspace root.
    Auto,
    /// Only the named agents.
    Agents,
    /// One user-chosen directory.
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRoot {
    pub label: String,
    pub path: PathBuf,
    pub cleanup_eligible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSource {
    pub mode: SourceMode,
    pub roots: Vec<PlanRoot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub unique_skills: usize,
    pub create: usize,
    pub update: usize,
    pub skip: usize,
    /// Occurrences folded into another occurrence's group.
    pub deduped_occurrences: usize,
    pub skipped_folders: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupPlanItem {
    /// Body fingerprint shared by every occurrence.
    pub id: String,
    pub name: String,
    pub slug: String,
    pub canonical_path: PathBuf,
    pub action: Action,
    pub confidence: Confidence,
    pub reason: String,
    pub target_skill_id: Option<String>,
    pub target_skill_slug: Option<String>,
    pub validation: ValidationSummary,
    pub mentions: MentionSummary,
    pub occurrences: Vec<Occurrence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupPlan {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub link_policy: String,
    pub source: PlanSource,
    pub summary: PlanSummary,
    pub skipped: Vec<SkippedFolder>,
    pub items: Vec<BackupPlanItem>,
}

/// Which directories to scan. `source_dir` wins over `agents`; neither
/// means the default set.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub source_dir: Option<PathBuf>,
    pub agents: Option<Vec<String>>,
}

/// Turn plan options into discovery roots.
pub fn resolve_roots(options: &PlanOptions, dirs: &AgentDirs) -> Result<(SourceMode, Vec<DiscoveryRoot>)> {
    if let Some(dir) = &options.source_dir {
        return Ok((SourceMode::Custom, vec![DiscoveryRoot::custom(dir)]));
    }
    if let Some(agents) = &options.agents {
        let roots = dirs
            .select(agents)?
            .into_iter()
            .map(|(id, dir)| DiscoveryRoot::agent(id, dir))
            .collect();
        return Ok((SourceMode::Agents, roots));
    }
    let mut roots: Vec<DiscoveryRoot> = dirs
        .iter()
        .map(|(id, dir)| DiscoveryRoot::agent(id, dir))
        .collect();
    roots.push(DiscoveryRoot::agent(
        skillport_skills::agents::WORKSPACE_LABEL,
        dirs.workspace_root(),
    ));
    Ok((SourceMode::Auto, roots))
}

/// Discover, dedupe and decide. Reads the owned skill list once and mutates
/// nothing, so the same inputs always give the same plan.
pub async fn build_plan(
    repo: &dyn SkillRepository,
    mode: SourceMode,
    roots: &[DiscoveryRoot],
    created_at: DateTime<Utc>,
) -> Result<BackupPlan> {
    let owned: Vec<OwnedSkill> = list_all(repo, &ListFilter::owned())
        .await?
        .iter()
        .map(OwnedSkill::from)
        .collect();

    let discovery = discover(roots);
    let mut skipped = discovery.skipped;
    let mut entries = Vec::new();
    for candidate in &discovery.candidates {
        match read_skill_folder(&candidate.path) {
            Ok(draft) => entries.push((Occurrence::from(candidate), draft)),
            Err(e) => {
                debug!(path = %candidate.path.display(), error = %e, "unreadable candidate");
                skipped.push(SkippedFolder {
                    path: candidate.path.clone(),
                    reason: e.to_string(),
                });
            },
        }
    }

    let groups = group_by_fingerprint(entries);
    let mut summary = PlanSummary {
        unique_skills: groups.len(),
        skipped_folders: skipped.len(),
        ..Default::default()
    };

    let mut items: Vec<BackupPlanItem> = groups
        .into_iter()
        .map(|group| {
            let draft = group.canonical;
            let decision = decide(&draft.name, &draft.slug, draft.validation.ok, &owned);
            match decision.action {
                Action::Create => summary.create += 1,
                Action::Update => summary.update += 1,
                Action::Skip => summary.skip += 1,
            }
            summary.deduped_occurrences += group.occurrences.len().saturating_sub(1);
            BackupPlanItem {
                id: group.fingerprint,
                mentions: draft.mention_summary(),
                name: draft.name,
                slug: draft.slug,
                canonical_path: draft.folder,
                action: decision.action,
                confidence: decision.confidence,
                reason: decision.reason,
                target_skill_id: decision.target.as_ref().map(|t| t.id.clone()),
                target_skill_slug: decision.target.map(|t| t.slug),
                validation: draft.validation,
                occurrences: group.occurrences,
            }
        })
        .collect();
    items.sort_by(|a, b| {
        (a.name.to_lowercase(), &a.id).cmp(&(b.name.to_lowercase(), &b.id))
    });

    info!(
        skills = summary.unique_skills,
        create = summary.create,
        update = summary.update,
        skip = summary.skip,
        "built backup plan"
    );

    Ok(BackupPlan {
        version: PLAN_VERSION,
        created_at,
        link_policy: LINK_POLICY.into(),
        source: PlanSource {
            mode,
            roots: roots
                .iter()
                .map(|r| PlanRoot {
                    label: r.label.clone(),
                    path: r.path.clone(),
                    cleanup_eligible: r.cleanup_eligible,
                })
                .collect(),
        },
        summary,
        skipped,
        items,
    })
}

/// `<data_dir>/backups/plans/plan-<YYYYmmddTHHMMSSZ>.json`
pub fn default_plan_path(data_dir: &Path, created_at: DateTime<Utc>) -> PathBuf {
    data_dir
        .join("backups")
        .join("plans")
        .join(format!("plan-{}.json", created_at.format("%Y%m%dT%H%M%SZ")))
}

pub fn write_plan(plan: &BackupPlan, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut data = serde_json::to_string_pretty(plan)?;
    data.push('\n');
    std::fs::write(path, data)?;
    Ok(())
}

/// Read a plan file, rejecting any version other than [`PLAN_VERSION`]
/// before looking at the rest of the document.
pub fn read_plan(path: &Path) -> Result<BackupPlan> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read plan {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&data)?;
    let version = value.get("version");
    if version.and_then(serde_json::Value::as_u64) != Some(u64::from(PLAN_VERSION)) {
        return Err(Error::PlanVersion {
            expected: PLAN_VERSION,
            found: version.map_or_else(|| "missing".into(), ToString::to_string),
        });
    }
    Ok(serde_json::from_value(value)?)
}
