//! Local → remote backup of skill folders.
//!
//! [`plan::build_plan`] discovers unmanaged skill folders, collapses copies
//! by body fingerprint and decides create / update / skip for each one
//! without touching anything. [`apply::apply`] executes a reviewed plan item
//! by item against snapshots, then prunes the local copies that made it.

pub mod apply;
pub mod cleanup;
pub mod decision;
pub mod dedup;
pub mod error;
pub mod plan;
pub mod report;
pub mod snapshot;

pub use {
    apply::{ApplyOptions, apply},
    decision::{Action, Confidence, Decision, OwnedSkill, decide},
    dedup::{Occurrence, OccurrenceGroup},
    error::{Error, Result},
    plan::{
        BackupPlan, BackupPlanItem, PlanOptions, SourceMode, build_plan, default_plan_path,
        read_plan, resolve_roots, write_plan,
    },
    report::{ApplyCounts, ApplyStatus, BackupApplyItemResult, BackupApplyResult},
    snapshot::SnapshotManager,
};
