//! `sync`, `install`, `uninstall`, `lock`: remote store → agent directories.

use {
    skillport_config::SkillportConfig,
    skillport_skills::{
        AgentDirs, CopyLinker, InstallTarget, Installer, LockStore, install_by_ref, sync,
        uninstall,
    },
};

use crate::{print_json, repository};

fn targets(config: &SkillportConfig, agents: Option<Vec<String>>) -> anyhow::Result<Vec<InstallTarget>> {
    let cwd = std::env::current_dir()?;
    let dirs = AgentDirs::from_config(&config.agents, &cwd);
    let ids = match agents {
        Some(ids) => ids,
        None if !config.agents.default_targets.is_empty() => config.agents.default_targets.clone(),
        None => dirs.ids().map(str::to_string).collect(),
    };
    Ok(dirs
        .select(&ids)?
        .into_iter()
        .map(|(agent, dir)| InstallTarget::new(agent, dir))
        .collect())
}

fn installer(config: &SkillportConfig) -> Installer {
    Installer::new(Installer::default_root(&config.install))
}

pub async fn handle_sync(
    config: &SkillportConfig,
    agents: Option<Vec<String>>,
    json: bool,
) -> anyhow::Result<()> {
    let targets = targets(config, agents)?;
    let repo = repository(config)?;
    let store = LockStore::new(LockStore::default_path());
    let report = sync(&repo, &installer(config), &store, &targets).await?;

    if json {
        print_json(&report)?;
    } else {
        for (label, folders) in [
            ("installed", &report.installed),
            ("updated", &report.updated),
            ("unchanged", &report.unchanged),
            ("pruned", &report.pruned),
        ] {
            if !folders.is_empty() {
                println!("{label:>9}: {}", folders.join(", "));
            }
        }
        for failure in &report.failed {
            println!("   failed: {}: {}", failure.skill, failure.error);
        }
    }
    if !report.failed.is_empty() {
        anyhow::bail!("{} skill(s) failed to sync", report.failed.len());
    }
    Ok(())
}

pub async fn handle_install(
    config: &SkillportConfig,
    skill: &str,
    agents: Option<Vec<String>>,
    copy: bool,
) -> anyhow::Result<()> {
    let targets = targets(config, agents)?;
    let repo = repository(config)?;
    let store = LockStore::new(LockStore::default_path());
    let mut installer = installer(config);
    if copy {
        installer = installer.with_linker(CopyLinker);
    }

    let outcome = install_by_ref(&repo, &installer, &store, skill, &targets).await?;
    let result = &outcome.result;
    println!(
        "Installed {} at {}",
        result.folder_name,
        result.canonical_path.display()
    );
    for target in &result.targets {
        let fallback = if target.symlink_failed { " (symlink failed)" } else { "" };
        println!(
            "  {}: {} [{:?}]{fallback}",
            target.agent,
            target.path.display(),
            target.mode
        );
    }
    for failure in &result.failed_targets {
        println!("  {}: failed: {}", failure.agent, failure.error);
    }
    for skipped in &result.skipped_resources {
        println!("  skipped resource {skipped}");
    }
    Ok(())
}

pub fn handle_uninstall(config: &SkillportConfig, folder: &str) -> anyhow::Result<()> {
    let store = LockStore::new(LockStore::default_path());
    let report = uninstall(&store, &installer(config), folder)?;
    for path in &report.removed {
        println!("removed {}", path.display());
    }
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}

pub fn handle_lock(json: bool) -> anyhow::Result<()> {
    let store = LockStore::new(LockStore::default_path());
    let lock = store.read();
    if json {
        return print_json(&lock);
    }
    if lock.skills.is_empty() {
        println!("No skills installed ({}).", store.path().display());
        return Ok(());
    }
    for (folder, entry) in &lock.skills {
        println!("{folder}: {} ({}) from {}", entry.name, entry.skill_id, entry.source.server);
        for (agent, target) in &entry.targets {
            println!("  {agent}: {} [{:?}]", target.path.display(), target.mode);
        }
    }
    Ok(())
}
