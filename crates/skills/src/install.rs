//! Write remote skills to disk and place them into agent directories.

use std::{
    io,
    path::{Component, Path, PathBuf},
};

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    serde_json::Value,
    skillport_common::{
        fs::{copy_dir_all, is_symlink, remove_path},
        paths::{absolutize, ensure_safe, is_safe, normalize_relative},
    },
    skillport_remote::RemoteSkill,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    marker::{InstallMarker, MARKER_FILE, has_marker},
    parse::{self, SKILL_FILE},
};

/// How a skill ended up in an agent directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    Symlink,
    Copy,
}

/// Places the canonical folder at a target path without copying.
///
/// Any error makes the installer fall back to a recursive copy.
pub trait LinkStrategy: Send + Sync {
    fn link(&self, canonical: &Path, target: &Path) -> io::Result<()>;
}

/// Directory symlinks where the platform supports them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymlinkLinker;

impl LinkStrategy for SymlinkLinker {
    #[cfg(unix)]
    fn link(&self, canonical: &Path, target: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(canonical, target)
    }

    #[cfg(windows)]
    fn link(&self, canonical: &Path, target: &Path) -> io::Result<()> {
        std::os::windows::fs::symlink_dir(canonical, target)
    }

    #[cfg(not(any(unix, windows)))]
    fn link(&self, _canonical: &Path, _target: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "symlinks unsupported"))
    }
}

/// Never links, so every target becomes a copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyLinker;

impl LinkStrategy for CopyLinker {
    fn link(&self, _canonical: &Path, _target: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "copy-only install"))
    }
}

/// One agent skill directory to place a skill into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub agent: String,
    pub dir: PathBuf,
}

impl InstallTarget {
    pub fn new(agent: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            agent: agent.into(),
            dir: dir.into(),
        }
    }

    pub fn path_for(&self, folder_name: &str) -> PathBuf {
        self.dir.join(folder_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    pub agent: String,
    pub path: PathBuf,
    pub mode: TargetMode,
    pub symlink_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    pub agent: String,
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct InstallResult {
    pub folder_name: String,
    pub canonical_path: PathBuf,
    pub targets: Vec<TargetOutcome>,
    pub failed_targets: Vec<TargetFailure>,
    /// Resource paths that were not written, with the reason.
    pub skipped_resources: Vec<String>,
    pub installed_at: DateTime<Utc>,
}

/// Writes canonical skill folders under one root.
pub struct Installer {
    root: PathBuf,
    linker: Box<dyn LinkStrategy>,
}

impl Installer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            linker: Box::new(SymlinkLinker),
        }
    }

    /// Default root: `<data_dir>/skills`, or `install.root` from config.
    pub fn default_root(config: &skillport_config::InstallConfig) -> PathBuf {
        config
            .root
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| skillport_config::data_dir().join("skills"))
    }

    #[must_use]
    pub fn with_linker(mut self, linker: impl LinkStrategy + 'static) -> Self {
        self.linker = Box::new(linker);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn canonical_path(&self, folder_name: &str) -> PathBuf {
        self.root.join(folder_name)
    }

    /// Install under the sanitized slug as folder name.
    pub fn install(
        &self,
        skill: &RemoteSkill,
        server: &str,
        targets: &[InstallTarget],
    ) -> Result<InstallResult> {
        self.install_as(skill, &parse::sanitize_slug(&skill.slug), server, targets)
    }

    /// Wipe and rewrite `<root>/<folder_name>`, then place it into every
    /// target. Target problems are collected in the result; only failures
    /// on the canonical folder are errors.
    pub fn install_as(
        &self,
        skill: &RemoteSkill,
        folder_name: &str,
        server: &str,
        targets: &[InstallTarget],
    ) -> Result<InstallResult> {
        let canonical = entry_path(&self.root, folder_name)?;
        std::fs::create_dir_all(&self.root)?;
        ensure_safe(&self.root, &canonical)?;

        remove_path(&canonical)?;
        std::fs::create_dir_all(&canonical)?;

        let mut frontmatter = skill.frontmatter.clone();
        frontmatter
            .entry("name")
            .or_insert_with(|| Value::String(skill.name.clone()));
        frontmatter
            .entry("description")
            .or_insert_with(|| Value::String(skill.description.clone()));
        std::fs::write(
            canonical.join(SKILL_FILE),
            parse::render_document(&frontmatter, &skill.markdown)?,
        )?;

        let mut skipped_resources = Vec::new();
        for resource in &skill.resources {
            let Some(rel) = normalize_relative(&resource.path) else {
                skipped_resources.push(format!("{}: unsafe path", resource.path));
                continue;
            };
            if rel == SKILL_FILE || rel == MARKER_FILE {
                skipped_resources.push(format!("{rel}: reserved name"));
                continue;
            }
            let dest = canonical.join(&rel);
            if !is_safe(&canonical, &dest) {
                warn!(path = %rel, skill = %skill.slug, "resource escapes skill folder");
                skipped_resources.push(format!("{rel}: escapes skill folder"));
                continue;
            }
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&dest, &resource.content)?;
        }

        let installed_at = Utc::now();
        InstallMarker {
            skill_id: skill.id.clone(),
            slug: skill.slug.clone(),
            name: skill.name.clone(),
            visibility: skill.visibility,
            server: server.to_string(),
            installed_at,
        }
        .write(&canonical)?;

        let mut outcomes = Vec::new();
        let mut failed_targets = Vec::new();
        for target in targets {
            match self.place(&canonical, folder_name, target) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(agent = %target.agent, error = %e, "failed to place skill");
                    failed_targets.push(TargetFailure {
                        agent: target.agent.clone(),
                        path: target.path_for(folder_name),
                        error: e.to_string(),
                    });
                },
            }
        }

        info!(
            slug = %skill.slug,
            folder = folder_name,
            targets = outcomes.len(),
            failed = failed_targets.len(),
            "installed skill"
        );
        Ok(InstallResult {
            folder_name: folder_name.to_string(),
            canonical_path: canonical,
            targets: outcomes,
            failed_targets,
            skipped_resources,
            installed_at,
        })
    }

    fn place(
        &self,
        canonical: &Path,
        folder_name: &str,
        target: &InstallTarget,
    ) -> Result<TargetOutcome> {
        let dest = entry_path(&target.dir, folder_name)?;
        let outcome = |mode, symlink_failed| TargetOutcome {
            agent: target.agent.clone(),
            path: dest.clone(),
            mode,
            symlink_failed,
        };

        if absolutize(&dest) == absolutize(canonical) {
            return Ok(outcome(TargetMode::Copy, false));
        }

        if std::fs::symlink_metadata(&dest).is_ok() {
            if is_symlink(&dest) || has_marker(&dest) {
                remove_path(&dest)?;
            } else {
                return Err(Error::message(format!(
                    "{} is occupied by a folder not installed by skillport",
                    dest.display()
                )));
            }
        }
        std::fs::create_dir_all(&target.dir)?;

        match self.linker.link(canonical, &dest) {
            Ok(()) => {
                debug!(agent = %target.agent, path = %dest.display(), "linked");
                Ok(outcome(TargetMode::Symlink, false))
            },
            Err(e) => {
                debug!(agent = %target.agent, error = %e, "symlink failed, copying");
                remove_path(&dest)?;
                copy_dir_all(canonical, &dest)?;
                Ok(outcome(TargetMode::Copy, true))
            },
        }
    }
}

/// `dir/name` where `name` must be one plain path component. Only the name
/// is checked, since the entry itself may be a link leading elsewhere.
fn entry_path(dir: &Path, name: &str) -> Result<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(dir.join(name)),
        _ => Err(skillport_common::Error::path_escape(dir, dir.join(name)).into()),
    }
}
