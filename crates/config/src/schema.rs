/// Config schema types (remote store, agents, backup, install).
use std::collections::BTreeMap;

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillportConfig {
    pub remote: RemoteConfig,
    pub agents: AgentsConfig,
    pub backup: BackupConfig,
    pub install: InstallConfig,
}

/// Where the canonical skill store lives and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the skill store API.
    pub base_url: String,
    /// Bearer token. Prefer `SKILLPORT_TOKEN` over storing it here.
    #[serde(skip_serializing)]
    pub token: Option<Secret<String>>,
    /// Page size used when listing skills.
    pub page_size: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8787".into(),
            token: None,
            page_size: 100,
        }
    }
}

/// Agent skill directories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Per-agent skill directory overrides, keyed by agent id (`claude`, `codex`, ...).
    pub dirs: BTreeMap<String, String>,
    /// Agents targeted by `sync` and `install` when none are given on the command line.
    pub default_targets: Vec<String>,
}

/// Backup (local → remote) behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// How many suffixed slugs (`-2`, `-3`, ...) to try after a slug conflict.
    pub slug_conflict_retries: u32,
    /// Keep the snapshot directory even when every item succeeded.
    pub keep_snapshots: bool,
    /// Remove backed-up local folders from agent directories after success.
    pub cleanup: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            slug_conflict_retries: 5,
            keep_snapshots: false,
            cleanup: true,
        }
    }
}

/// Installer (remote → local) behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Canonical install root. Defaults to `<data_dir>/skills`.
    pub root: Option<String>,
}
