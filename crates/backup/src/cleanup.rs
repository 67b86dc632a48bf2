//! Remove local copies of skills that now live in the remote store.

use std::path::{Path, PathBuf};

use {
    skillport_common::{fs::remove_path, paths::is_safe},
    skillport_skills::{discover::is_skill_folder, marker::has_marker},
    tracing::{debug, info, warn},
};

use crate::{dedup::Occurrence, plan::BackupPlan, report::BackupApplyItemResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

/// Delete the occurrences of every created/updated item.
///
/// Only cleanup-eligible occurrences strictly inside their recorded root are
/// touched, and only while they still hold a `SKILL.md` and no install
/// marker. Failures become warnings.
pub fn prune(plan: &BackupPlan, results: &[BackupApplyItemResult]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for item in &plan.items {
        let done = results
            .iter()
            .any(|r| r.item_id == item.id && r.succeeded());
        if !done {
            continue;
        }
        for occurrence in &item.occurrences {
            prune_one(occurrence, &mut report);
        }
    }
    if !report.removed.is_empty() {
        info!(removed = report.removed.len(), warnings = report.warnings.len(), "cleaned up local folders");
    }
    report
}

fn prune_one(occurrence: &Occurrence, report: &mut CleanupReport) {
    let path = &occurrence.path;
    if !occurrence.cleanup_eligible {
        debug!(path = %path.display(), "not cleanup eligible");
        return;
    }
    if !inside_root(&occurrence.parent_root, path) {
        report.warnings.push(format!(
            "{} is outside {}, left in place",
            path.display(),
            occurrence.parent_root.display()
        ));
        return;
    }
    if std::fs::symlink_metadata(path).is_err() {
        debug!(path = %path.display(), "already gone");
        return;
    }
    if !is_skill_folder(path) {
        report
            .warnings
            .push(format!("{} no longer looks like a skill folder, left in place", path.display()));
        return;
    }
    if has_marker(path) {
        report
            .warnings
            .push(format!("{} is now managed by skillport install, left in place", path.display()));
        return;
    }
    match remove_path(path) {
        Ok(_) => report.removed.push(path.clone()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cleanup failed");
            report
                .warnings
                .push(format!("failed to remove {}: {e}", path.display()));
        },
    }
}

fn inside_root(root: &Path, path: &Path) -> bool {
    is_safe(root, path) && !is_safe(path, root)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            decision::{Action, Confidence},
            plan::{BackupPlanItem, PLAN_VERSION, PlanSource, PlanSummary, SourceMode},
            report::ApplyStatus,
        },
        skillport_skills::MARKER_FILE,
    };

    fn skill(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("SKILL.md"), "body").unwrap();
    }

    fn occurrence(root: &Path, path: &Path, eligible: bool) -> Occurrence {
        Occurrence {
            path: path.to_path_buf(),
            parent_root: root.to_path_buf(),
            agent_label: "claude".into(),
            cleanup_eligible: eligible,
        }
    }

    fn plan(occurrences: Vec<Occurrence>) -> BackupPlan {
        BackupPlan {
            version: PLAN_VERSION,
            created_at: Default::default(),
            link_policy: "symlink-or-copy".into(),
            source: PlanSource {
                mode: SourceMode::Auto,
                roots: Vec::new(),
            },
            summary: PlanSummary::default(),
            skipped: Vec::new(),
            items: vec![BackupPlanItem {
                id: "fp".into(),
                name: "foo".into(),
                slug: "foo".into(),
                canonical_path: occurrences[0].path.clone(),
                action: Action::Create,
                confidence: Confidence::High,
                reason: "no matching skill found".into(),
                target_skill_id: None,
                target_skill_slug: None,
                validation: Default::default(),
                mentions: Default::default(),
                occurrences,
            }],
        }
    }

    fn result(status: ApplyStatus) -> Vec<BackupApplyItemResult> {
        vec![BackupApplyItemResult::new("fp", "foo", status)]
    }

    #[test]
    fn removes_only_eligible_unmarked_skill_folders() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("claude");
        let eligible = root.join("foo");
        let custom = tmp.path().join("custom/foo");
        let marked = root.join("marked");
        let emptied = root.join("emptied");
        for dir in [&eligible, &custom, &marked] {
            skill(dir);
        }
        std::fs::write(marked.join(MARKER_FILE), "{}").unwrap();
        std::fs::create_dir_all(&emptied).unwrap();

        let plan = plan(vec![
            occurrence(&root, &eligible, true),
            occurrence(&tmp.path().join("custom"), &custom, false),
            occurrence(&root, &marked, true),
            occurrence(&root, &emptied, true),
        ]);
        let report = prune(&plan, &result(ApplyStatus::Created));

        assert_eq!(report.removed, vec![eligible.clone()]);
        assert!(!eligible.exists());
        assert!(custom.exists() && marked.exists() && emptied.exists());
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn paths_outside_their_root_are_never_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("claude");
        let outside = tmp.path().join("claude2/foo");
        skill(&outside);
        skill(&root);

        let plan = plan(vec![
            occurrence(&root, &outside, true),
            occurrence(&root, &root, true),
        ]);
        let report = prune(&plan, &result(ApplyStatus::Updated));
        assert!(report.removed.is_empty());
        assert!(outside.exists() && root.exists());
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn failed_items_are_not_cleaned() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("claude");
        let folder = root.join("foo");
        skill(&folder);
        let report = prune(&plan(vec![occurrence(&root, &folder, true)]), &result(ApplyStatus::Failed));
        assert_eq!(report, CleanupReport::default());
        assert!(folder.exists());
    }
}
