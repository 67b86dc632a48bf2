//! Well-known agent skill directories.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use skillport_config::AgentsConfig;

use crate::error::{Error, Result};

/// Home-relative skill directory of every agent known out of the box.
pub const KNOWN_AGENTS: &[(&str, &str)] = &[
    ("claude", ".claude/skills"),
    ("codex", ".codex/skills"),
    ("cursor", ".cursor/skills"),
    ("gemini", ".gemini/skills"),
    ("opencode", ".config/opencode/skills"),
    ("copilot", ".copilot/skills"),
];

/// Label used for the project-local root.
pub const WORKSPACE_LABEL: &str = "workspace";

/// Project-local skill root, relative to the working directory.
pub const WORKSPACE_SKILLS_DIR: &str = ".agents/skills";

/// Resolved skill directory per agent id.
#[derive(Debug, Clone)]
pub struct AgentDirs {
    dirs: BTreeMap<String, PathBuf>,
    workspace: PathBuf,
}

impl AgentDirs {
    /// Catalog defaults rooted at `home`, workspace root under `cwd`.
    pub fn new(home: &Path, cwd: &Path) -> Self {
        let dirs = KNOWN_AGENTS
            .iter()
            .map(|(id, rel)| ((*id).to_string(), home.join(rel)))
            .collect();
        Self {
            dirs,
            workspace: cwd.join(WORKSPACE_SKILLS_DIR),
        }
    }

    /// Catalog defaults for the current user with config overrides applied.
    ///
    /// Overrides may name agents outside the catalog; those become known ids.
    pub fn from_config(config: &AgentsConfig, cwd: &Path) -> Self {
        let home = directories::BaseDirs::new()
            .map(|b| b.home_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let mut dirs = Self::new(&home, cwd);
        for (id, raw) in &config.dirs {
            dirs = dirs.with_override(id, expand_home(raw, &home));
        }
        dirs
    }

    #[must_use]
    pub fn with_override(mut self, id: &str, dir: impl Into<PathBuf>) -> Self {
        self.dirs.insert(id.to_string(), dir.into());
        self
    }

    pub fn dir(&self, id: &str) -> Result<&Path> {
        self.dirs
            .get(id)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::UnknownAgent {
                id: id.to_string(),
                known: self.ids().collect::<Vec<_>>().join(", "),
            })
    }

    /// Resolve a list of agent ids, failing on the first unknown one.
    pub fn select(&self, ids: &[String]) -> Result<Vec<(String, PathBuf)>> {
        ids.iter()
            .map(|id| Ok((id.clone(), self.dir(id)?.to_path_buf())))
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.dirs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.dirs.iter().map(|(id, dir)| (id.as_str(), dir.as_path()))
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace
    }
}

fn expand_home(raw: &str, home: &Path) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None if raw == "~" => home.to_path_buf(),
        None => PathBuf::from(raw),
    }
}
