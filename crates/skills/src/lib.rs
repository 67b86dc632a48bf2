//! Local skill folders.
//!
//! Reading a folder into a [`SkillDraft`], discovering unmanaged folders in
//! agent directories, installing remote skills into a canonical store with
//! per-agent links, and the install lock that makes sync idempotent.

pub mod agents;
pub mod discover;
pub mod error;
pub mod fingerprint;
pub mod install;
pub mod lock;
pub mod marker;
pub mod mentions;
pub mod parse;
pub mod reader;
pub mod sync;
pub mod types;

pub use {
    agents::AgentDirs,
    discover::{Candidate, Discovery, DiscoveryRoot, SkippedFolder, discover},
    error::{Error, Result},
    fingerprint::fingerprint,
    install::{
        CopyLinker, InstallResult, InstallTarget, Installer, LinkStrategy, SymlinkLinker,
        TargetMode,
    },
    lock::{InstallLock, InstallLockSkillEntry, LockStore},
    marker::{InstallMarker, MARKER_FILE},
    reader::read_skill_folder,
    sync::{SyncReport, install_by_ref, install_one, sync, uninstall},
    types::{MentionSummary, SkillDraft, ValidationSummary},
};
