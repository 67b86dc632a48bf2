//! Remote → local reconciliation driven by the install lock.

use std::{collections::HashSet, path::PathBuf};

use {
    serde::Serialize,
    skillport_common::{
        fs::{is_symlink, remove_path},
        paths::is_safe,
    },
    skillport_remote::{
        ListFilter, RemoteError, RemoteSkill, SkillRepository, SkillSummary, Visibility, list_all,
    },
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    install::{InstallResult, InstallTarget, Installer},
    lock::{InstallLock, InstallLockSkillEntry, LockSource, LockStore, LockTarget},
    marker::has_marker,
    parse,
};

/// Per-run outcome, by folder name (or skill slug for failures).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub installed: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub pruned: Vec<String>,
    pub failed: Vec<SyncFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub skill: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub result: InstallResult,
    /// The lock already held this skill before the install.
    pub replaced: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UninstallReport {
    pub folder_name: String,
    pub removed: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

/// Folder name for a skill: its sanitized slug, suffixed `-2`, `-3`, ... while
/// the lock maps that name to a different skill.
pub fn allocate_folder_name(lock: &InstallLock, slug: &str, skill_id: &str) -> String {
    let base = parse::sanitize_slug(slug);
    let mut candidate = base.clone();
    let mut n = 2;
    while lock
        .skills
        .get(&candidate)
        .is_some_and(|entry| entry.skill_id != skill_id)
    {
        candidate = format!("{base}-{n}");
        n += 1;
    }
    candidate
}

/// Install one fetched skill and record it in the lock.
///
/// Targets from an earlier install that were not requested this time are
/// kept. If the skill previously lived under another folder name, that
/// folder is uninstalled afterwards.
pub fn install_one(
    installer: &Installer,
    store: &LockStore,
    skill: &RemoteSkill,
    server: &str,
    targets: &[InstallTarget],
) -> Result<InstallOutcome> {
    let lock = store.read();
    let folder_name = allocate_folder_name(&lock, &skill.slug, &skill.id);
    let previous = lock
        .find_by_skill_id(&skill.id)
        .map(|(name, entry)| (name.to_string(), entry.clone()));

    let result = installer.install_as(skill, &folder_name, server, targets)?;

    let mut entry_targets = previous
        .as_ref()
        .filter(|(name, _)| *name == folder_name)
        .map(|(_, entry)| entry.targets.clone())
        .unwrap_or_default();
    for outcome in &result.targets {
        entry_targets.insert(outcome.agent.clone(), LockTarget {
            path: outcome.path.clone(),
            mode: outcome.mode,
            symlink_failed: outcome.symlink_failed,
            installed_at: result.installed_at,
        });
    }

    let entry = InstallLockSkillEntry {
        skill_id: skill.id.clone(),
        slug: skill.slug.clone(),
        name: skill.name.clone(),
        description: skill.description.clone(),
        visibility: skill.visibility,
        canonical_path: result.canonical_path.clone(),
        source: LockSource {
            server: server.to_string(),
            url: skill.source_url.clone(),
        },
        updated_at: result.installed_at,
        remote_updated_at: skill.updated_at,
        targets: entry_targets,
    };
    store.update(|lock| lock.skills.insert(folder_name.clone(), entry))?;

    if let Some((old_name, _)) = previous.as_ref().filter(|(name, _)| *name != folder_name) {
        info!(from = %old_name, to = %folder_name, "skill folder renamed");
        uninstall(store, installer, old_name)?;
    }

    Ok(InstallOutcome {
        result,
        replaced: previous.is_some(),
    })
}

/// Fetch one skill by id, falling back to an owned-skill slug lookup, and
/// install it.
pub async fn install_by_ref(
    repo: &dyn SkillRepository,
    installer: &Installer,
    store: &LockStore,
    id_or_slug: &str,
    targets: &[InstallTarget],
) -> Result<InstallOutcome> {
    let skill = match repo.get_by_id(id_or_slug).await {
        Ok(skill) => skill,
        Err(RemoteError::NotFound { .. }) => {
            let owned = list_all(repo, &ListFilter::owned()).await?;
            let summary = owned
                .iter()
                .find(|s| s.slug.eq_ignore_ascii_case(id_or_slug))
                .ok_or_else(|| Error::message(format!("no owned skill with id or slug '{id_or_slug}'")))?;
            repo.get_by_id(&summary.id).await?
        },
        Err(e) => return Err(e.into()),
    };
    install_one(installer, store, &skill, &repo.server_identity(), targets)
}

/// Remove an installed folder: its canonical copy, every recorded target,
/// then its lock entry. Missing paths are fine. Target folders that are
/// neither links nor marked as installed are left alone with a warning, as
/// is a canonical folder outside the current install root.
pub fn uninstall(store: &LockStore, installer: &Installer, folder_name: &str) -> Result<UninstallReport> {
    let lock = store.read();
    let Some(entry) = lock.skills.get(folder_name) else {
        return Err(Error::message(format!("'{folder_name}' is not in the install lock")));
    };

    let mut report = UninstallReport {
        folder_name: folder_name.to_string(),
        ..Default::default()
    };
    let canonical_in_root = is_safe(installer.root(), &entry.canonical_path);

    for (agent, target) in &entry.targets {
        let path = &target.path;
        if std::fs::symlink_metadata(path).is_err() {
            continue;
        }
        if is_symlink(path) || has_marker(path) {
            if remove_path(path)? {
                report.removed.push(path.clone());
            }
        } else {
            warn!(%agent, path = %path.display(), "leaving unmanaged folder in place");
            report
                .warnings
                .push(format!("{agent}: {} is not managed by skillport, left in place", path.display()));
        }
    }

    if canonical_in_root {
        if remove_path(&entry.canonical_path)? {
            report.removed.push(entry.canonical_path.clone());
        }
    } else {
        warn!(
            path = %entry.canonical_path.display(),
            root = %installer.root().display(),
            "canonical folder is outside the install root, leaving it in place"
        );
        report.warnings.push(format!(
            "{} is outside the install root {}, left in place",
            entry.canonical_path.display(),
            installer.root().display()
        ));
    }

    store.update(|lock| lock.skills.remove(folder_name))?;
    info!(folder = folder_name, removed = report.removed.len(), "uninstalled skill");
    Ok(report)
}

fn is_unchanged(
    lock: &InstallLock,
    summary: &SkillSummary,
    targets: &[InstallTarget],
) -> Option<String> {
    let (folder_name, entry) = lock.find_by_skill_id(&summary.id)?;
    let in_place = entry.remote_updated_at == summary.updated_at
        && entry.canonical_path.is_dir()
        && targets.iter().all(|t| {
            entry.targets.get(&t.agent).is_some_and(|recorded| {
                recorded.path == t.path_for(folder_name)
                    && std::fs::symlink_metadata(&recorded.path).is_ok()
            })
        });
    in_place.then(|| folder_name.to_string())
}

/// Install every owned private skill into `targets`, then prune lock entries
/// whose skill no longer exists remotely.
///
/// An entry missing from the owned listing (for example one installed by id
/// from another owner) is only pruned once `get_by_id` reports it gone.
pub async fn sync(
    repo: &dyn SkillRepository,
    installer: &Installer,
    store: &LockStore,
    targets: &[InstallTarget],
) -> Result<SyncReport> {
    let owned = list_all(repo, &ListFilter::owned()).await?;
    let owned_ids: HashSet<&str> = owned.iter().map(|s| s.id.as_str()).collect();
    let server = repo.server_identity();
    let mut report = SyncReport::default();

    let lock = store.read();
    for summary in owned.iter().filter(|s| s.visibility == Visibility::Private) {
        if let Some(folder) = is_unchanged(&lock, summary, targets) {
            report.unchanged.push(folder);
            continue;
        }

        let skill = match repo.get_by_id(&summary.id).await {
            Ok(skill) => skill,
            Err(e) => {
                warn!(slug = %summary.slug, error = %e, "failed to fetch skill");
                report.failed.push(SyncFailure {
                    skill: summary.slug.clone(),
                    error: e.to_string(),
                });
                continue;
            },
        };

        match install_one(installer, store, &skill, &server, targets) {
            Ok(outcome) => {
                for failure in &outcome.result.failed_targets {
                    report.failed.push(SyncFailure {
                        skill: skill.slug.clone(),
                        error: format!("{}: {}", failure.agent, failure.error),
                    });
                }
                let folder = outcome.result.folder_name;
                if outcome.replaced {
                    report.updated.push(folder);
                } else {
                    report.installed.push(folder);
                }
            },
            Err(e) => {
                warn!(slug = %skill.slug, error = %e, "failed to install skill");
                report.failed.push(SyncFailure {
                    skill: skill.slug.clone(),
                    error: e.to_string(),
                });
            },
        }
    }

    let stale: Vec<(String, String)> = store
        .read()
        .skills
        .iter()
        .filter(|(_, entry)| !owned_ids.contains(entry.skill_id.as_str()))
        .map(|(name, entry)| (name.clone(), entry.skill_id.clone()))
        .collect();
    for (folder, skill_id) in stale {
        match repo.get_by_id(&skill_id).await {
            Err(RemoteError::NotFound { .. }) => {},
            Ok(_) => {
                debug!(%folder, %skill_id, "skill not owned but still present remotely, keeping");
                continue;
            },
            Err(e) => {
                warn!(%folder, error = %e, "could not confirm skill removal");
                report.failed.push(SyncFailure {
                    skill: folder,
                    error: e.to_string(),
                });
                continue;
            },
        }
        match uninstall(store, installer, &folder) {
            Ok(_) => report.pruned.push(folder),
            Err(e) => {
                warn!(%folder, error = %e, "failed to prune skill");
                report.failed.push(SyncFailure {
                    skill: folder,
                    error: e.to_string(),
                });
            },
        }
    }

    info!(
        installed = report.installed.len(),
        updated = report.updated.len(),
        unchanged = report.unchanged.len(),
        pruned = report.pruned.len(),
        failed = report.failed.len(),
        "sync finished"
    );
    Ok(report)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        skillport_remote::{MemorySkillRepository, SkillPatch, memory::private_input},
    };

    struct Fixture {
        _tmp: tempfile::TempDir,
        installer: Installer,
        store: LockStore,
        targets: Vec<InstallTarget>,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let installer = Installer::new(tmp.path().join("store"));
        let store = LockStore::new(tmp.path().join("config/skills-lock.json"));
        let targets = vec![
            InstallTarget::new("claude", tmp.path().join("claude")),
            InstallTarget::new("codex", tmp.path().join("codex")),
        ];
        Fixture {
            _tmp: tmp,
            installer,
            store,
            targets,
        }
    }

    #[test]
    fn folder_names_get_suffixes_when_taken_by_another_skill() {
        let fx = fixture();
        let repo_skill = |id: &str| RemoteSkill {
            id: id.into(),
            slug: "pdf".into(),
            name: "pdf".into(),
            description: "d".into(),
            visibility: Visibility::Private,
            frontmatter: Default::default(),
            markdown: "body".into(),
            resources: Vec::new(),
            updated_at: Default::default(),
            source_url: None,
        };
        install_one(&fx.installer, &fx.store, &repo_skill("a"), "s", &[]).unwrap();
        let lock = fx.store.read();
        assert_eq!(allocate_folder_name(&lock, "pdf", "a"), "pdf");
        assert_eq!(allocate_folder_name(&lock, "PDF", "b"), "pdf-2");

        let second = install_one(&fx.installer, &fx.store, &repo_skill("b"), "s", &[]).unwrap();
        assert_eq!(second.result.folder_name, "pdf-2");
        assert!(!second.replaced);
    }

    #[tokio::test]
    async fn sync_installs_then_reports_unchanged() {
        let fx = fixture();
        let repo = MemorySkillRepository::new();
        repo.create(private_input("pdf", "PDF", "body")).await.unwrap();
        let mut public = private_input("pub", "Public", "body");
        public.visibility = Visibility::Public;
        repo.create(public).await.unwrap();

        let first = sync(&repo, &fx.installer, &fx.store, &fx.targets).await.unwrap();
        assert_eq!(first.installed, vec!["pdf"]);
        assert!(first.failed.is_empty(), "{:?}", first.failed);

        let lock = fx.store.read();
        let entry = &lock.skills["pdf"];
        assert_eq!(entry.targets.len(), 2);
        assert_eq!(entry.source.server, repo.server_identity());

        let second = sync(&repo, &fx.installer, &fx.store, &fx.targets).await.unwrap();
        assert_eq!(second.unchanged, vec!["pdf"]);
        assert!(second.installed.is_empty() && second.updated.is_empty());
    }

    #[tokio::test]
    async fn sync_reinstalls_after_remote_update() {
        let fx = fixture();
        let repo = MemorySkillRepository::new();
        let skill = repo.create(private_input("pdf", "PDF", "v1")).await.unwrap();
        sync(&repo, &fx.installer, &fx.store, &fx.targets).await.unwrap();

        repo.update(&skill.id, SkillPatch::markdown("v2")).await.unwrap();
        let report = sync(&repo, &fx.installer, &fx.store, &fx.targets).await.unwrap();
        assert_eq!(report.updated, vec!["pdf"]);
        let doc = std::fs::read_to_string(fx.installer.canonical_path("pdf").join("SKILL.md")).unwrap();
        assert!(doc.contains("v2"));
    }

    #[tokio::test]
    async fn sync_prunes_skills_removed_remotely() {
        let fx = fixture();
        let repo = MemorySkillRepository::new();
        let keep = repo.create(private_input("keep", "Keep", "k")).await.unwrap();
        let gone = repo.create(private_input("gone", "Gone", "g")).await.unwrap();
        sync(&repo, &fx.installer, &fx.store, &fx.targets).await.unwrap();

        let recorded: Vec<PathBuf> = fx.store.read().skills["gone"]
            .targets
            .values()
            .map(|t| t.path.clone())
            .collect();
        assert_eq!(recorded.len(), 2);

        assert!(repo.remove(&gone.id));
        let report = sync(&repo, &fx.installer, &fx.store, &fx.targets).await.unwrap();
        assert_eq!(report.pruned, vec!["gone"]);

        let lock = fx.store.read();
        assert!(!lock.skills.contains_key("gone"));
        assert_eq!(lock.skills["keep"].skill_id, keep.id);
        assert!(!fx.installer.canonical_path("gone").exists());
        for path in recorded {
            assert!(std::fs::symlink_metadata(&path).is_err(), "{path:?} still present");
        }
    }

    #[tokio::test]
    async fn fetch_failures_are_collected_not_fatal() {
        let fx = fixture();
        let repo = MemorySkillRepository::new();
        repo.create(private_input("a", "A", "a")).await.unwrap();
        repo.create(private_input("b", "B", "b")).await.unwrap();
        repo.fail_next(skillport_remote::FailOn::GetById, "boom");

        let report = sync(&repo, &fx.installer, &fx.store, &fx.targets).await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.installed.len(), 1);
    }

    #[tokio::test]
    async fn install_by_slug_and_uninstall() {
        let fx = fixture();
        let repo = MemorySkillRepository::new();
        repo.create(private_input("pdf", "PDF", "body")).await.unwrap();

        let outcome = install_by_ref(&repo, &fx.installer, &fx.store, "pdf", &fx.targets)
            .await
            .unwrap();
        assert_eq!(outcome.result.targets.len(), 2);

        let report = uninstall(&fx.store, &fx.installer, "pdf").unwrap();
        assert_eq!(report.removed.len(), 3);
        assert!(report.warnings.is_empty());
        assert!(fx.store.read().skills.is_empty());
        assert!(uninstall(&fx.store, &fx.installer, "pdf").is_err());
    }

    #[test]
    fn uninstall_leaves_unmanaged_target_folders() {
        let fx = fixture();
        let skill = RemoteSkill {
            id: "x".into(),
            slug: "pdf".into(),
            name: "pdf".into(),
            description: "d".into(),
            visibility: Visibility::Private,
            frontmatter: Default::default(),
            markdown: "body".into(),
            resources: Vec::new(),
            updated_at: Default::default(),
            source_url: None,
        };
        install_one(&fx.installer, &fx.store, &skill, "s", &fx.targets[..1]).unwrap();
        let target = fx.targets[0].path_for("pdf");
        remove_path(&target).unwrap();
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("SKILL.md"), "hand made").unwrap();

        let report = uninstall(&fx.store, &fx.installer, "pdf").unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(target.join("SKILL.md").exists());
    }

    #[tokio::test]
    async fn sync_keeps_installed_skills_from_other_owners() {
        let fx = fixture();
        let repo = MemorySkillRepository::new();
        let foreign = repo.insert_foreign(private_input("shared", "Shared", "body"));
        install_by_ref(&repo, &fx.installer, &fx.store, &foreign.id, &fx.targets)
            .await
            .unwrap();

        let report = sync(&repo, &fx.installer, &fx.store, &fx.targets).await.unwrap();
        assert!(report.pruned.is_empty(), "{:?}", report.pruned);
        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert!(fx.store.read().skills.contains_key("shared"));
        assert!(fx.installer.canonical_path("shared").is_dir());

        assert!(repo.remove(&foreign.id));
        let report = sync(&repo, &fx.installer, &fx.store, &fx.targets).await.unwrap();
        assert_eq!(report.pruned, vec!["shared"]);
        assert!(fx.store.read().skills.is_empty());
    }

    #[test]
    fn uninstall_outside_install_root_still_drops_the_entry() {
        let fx = fixture();
        let skill = RemoteSkill {
            id: "x".into(),
            slug: "pdf".into(),
            name: "pdf".into(),
            description: "d".into(),
            visibility: Visibility::Private,
            frontmatter: Default::default(),
            markdown: "body".into(),
            resources: Vec::new(),
            updated_at: Default::default(),
            source_url: None,
        };
        install_one(&fx.installer, &fx.store, &skill, "s", &fx.targets[..1]).unwrap();
        let canonical = fx.installer.canonical_path("pdf");
        let target = fx.targets[0].path_for("pdf");

        let moved = Installer::new(fx.installer.root().parent().unwrap().join("moved"));
        let report = uninstall(&fx.store, &moved, "pdf").unwrap();

        assert_eq!(report.warnings.len(), 1, "{:?}", report.warnings);
        assert!(canonical.join("SKILL.md").exists());
        assert!(std::fs::symlink_metadata(&target).is_err());
        assert!(fx.store.read().skills.is_empty());
    }
}
