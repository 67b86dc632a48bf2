//! `plan` and `apply`: local skill folders → remote store.

use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    chrono::Utc,
    skillport_backup::{
        Action, ApplyOptions, ApplyStatus, BackupApplyResult, BackupPlan, PlanOptions,
        SnapshotManager, apply, build_plan, default_plan_path, read_plan, resolve_roots,
        write_plan,
    },
    skillport_config::SkillportConfig,
    skillport_skills::AgentDirs,
};

use crate::{print_json, repository};

pub async fn handle_plan(
    config: &SkillportConfig,
    source_dir: Option<PathBuf>,
    agents: Option<Vec<String>>,
    output: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let dirs = AgentDirs::from_config(&config.agents, &cwd);
    let (mode, roots) = resolve_roots(&PlanOptions { source_dir, agents }, &dirs)?;

    let repo = repository(config)?;
    let created_at = Utc::now();
    let plan = build_plan(&repo, mode, &roots, created_at).await?;
    let path = output.unwrap_or_else(|| default_plan_path(&skillport_config::data_dir(), created_at));
    write_plan(&plan, &path)?;

    if json {
        return print_json(&plan);
    }
    print_plan(&plan, &path);
    Ok(())
}

fn print_plan(plan: &BackupPlan, path: &Path) {
    let s = &plan.summary;
    println!(
        "{} skill(s): {} create, {} update, {} skip ({} duplicate copies folded)",
        s.unique_skills, s.create, s.update, s.skip, s.deduped_occurrences
    );
    for item in &plan.items {
        let action = match item.action {
            Action::Create => "create",
            Action::Update => "update",
            Action::Skip => "skip",
        };
        let target = item
            .target_skill_slug
            .as_deref()
            .map(|slug| format!(" → {slug}"))
            .unwrap_or_default();
        println!(
            "  [{action:<6}] {} ({}){target}: {} [{:?}, {} copies]",
            item.name,
            item.slug,
            item.reason,
            item.confidence,
            item.occurrences.len()
        );
        for error in &item.validation.errors {
            println!("           ✗ {error}");
        }
    }
    for folder in &plan.skipped {
        println!("  [ignored] {}: {}", folder.path.display(), folder.reason);
    }
    println!("\nPlan written to {}", path.display());
    println!("Review it, then run: skillport apply {}", path.display());
}

pub async fn handle_apply(
    config: &SkillportConfig,
    plan_path: &Path,
    keep_snapshot: bool,
    no_cleanup: bool,
    json: bool,
) -> anyhow::Result<()> {
    let plan = read_plan(plan_path)
        .with_context(|| format!("cannot apply {}", plan_path.display()))?;

    let mut options = ApplyOptions::from(&config.backup);
    options.keep_snapshot |= keep_snapshot;
    options.cleanup &= !no_cleanup;

    let repo = repository(config)?;
    let snapshots = SnapshotManager::for_run(&skillport_config::data_dir(), Utc::now());
    let result = apply(&repo, &plan, &snapshots, options).await;

    if json {
        print_json(&result)?;
    } else {
        print_result(&result);
    }
    if result.counts.failed > 0 {
        anyhow::bail!("{} item(s) failed", result.counts.failed);
    }
    Ok(())
}

fn print_result(result: &BackupApplyResult) {
    for item in &result.items {
        let remote = item
            .remote_skill_slug
            .as_deref()
            .map(|slug| format!(" → {slug}"))
            .unwrap_or_default();
        let message = item.message.as_deref().unwrap_or_default();
        let mark = if item.status == ApplyStatus::Failed { "✗" } else { "✓" };
        println!("  {mark} [{}] {}{remote} {message}", item.status, item.name);
    }
    let c = &result.counts;
    println!(
        "\n{} created, {} updated, {} skipped, {} failed",
        c.created, c.updated, c.skipped, c.failed
    );
    for folder in &result.removed_folders {
        println!("  removed {}", folder.display());
    }
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
    if result.snapshot_kept {
        println!("Snapshot kept at {}", result.snapshot_dir.display());
    }
}
