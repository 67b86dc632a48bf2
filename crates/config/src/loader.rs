use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    error::{Error, Result},
    schema::SkillportConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "skillport.toml",
    "skillport.yaml",
    "skillport.yml",
    "skillport.json",
];

static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);
static DATA_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

fn read_override(slot: &Mutex<Option<PathBuf>>) -> Option<PathBuf> {
    slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

fn write_override(slot: &Mutex<Option<PathBuf>>, value: Option<PathBuf>) {
    *slot.lock().unwrap_or_else(|e| e.into_inner()) = value;
}

/// Override the config directory for the rest of the process.
pub fn set_config_dir(dir: PathBuf) {
    write_override(&CONFIG_DIR_OVERRIDE, Some(dir));
}

pub fn clear_config_dir() {
    write_override(&CONFIG_DIR_OVERRIDE, None);
}

/// Override the data directory for the rest of the process.
pub fn set_data_dir(dir: PathBuf) {
    write_override(&DATA_DIR_OVERRIDE, Some(dir));
}

pub fn clear_data_dir() {
    write_override(&DATA_DIR_OVERRIDE, None);
}

/// User-global config directory (`~/.config/skillport/`). Holds the lock file.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = read_override(&CONFIG_DIR_OVERRIDE) {
        return dir;
    }
    directories::ProjectDirs::from("", "", "skillport")
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".skillport"))
}

/// Data directory (`~/.local/share/skillport/`). Holds installs, plans and snapshots.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = read_override(&DATA_DIR_OVERRIDE) {
        return dir;
    }
    directories::ProjectDirs::from("", "", "skillport")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".skillport"))
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<SkillportConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./skillport.{toml,yaml,yml,json}` (project-local)
/// 2. `<config_dir>/skillport.{toml,yaml,yml,json}` (user-global)
///
/// Returns `SkillportConfig::default()` if no config file is found or the
/// file fails to parse. Environment overrides are applied either way.
pub fn discover_and_load() -> SkillportConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                SkillportConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            SkillportConfig::default()
        },
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config
}

/// Apply `SKILLPORT_URL` and `SKILLPORT_TOKEN` on top of a loaded config.
pub fn apply_env_overrides(config: &mut SkillportConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("SKILLPORT_URL").filter(|v| !v.trim().is_empty()) {
        config.remote.base_url = url;
    }
    if let Some(token) = lookup("SKILLPORT_TOKEN").filter(|v| !v.trim().is_empty()) {
        config.remote.token = Some(Secret::new(token));
    }
}

fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global_dir = config_dir();
    let global = CONFIG_FILENAMES.iter().map(|name| global_dir.join(name));
    local.chain(global).find(|p| p.is_file())
}

fn parse_config(raw: &str, path: &Path) -> Result<SkillportConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

/// Replace `${ENV_VAR}` placeholders. Unknown variables stay as written.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    },
                }
                rest = &after[end + 1..];
            },
            _ => {
                out.push_str("${");
                rest = after;
            },
        }
    }
    out.push_str(rest);
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn substitutes_known_and_keeps_unknown() {
        let lookup = |name: &str| (name == "SP_HOST").then(|| "example.org".to_string());
        assert_eq!(
            substitute_env_with("url = \"https://${SP_HOST}/${SP_MISSING}\"", lookup),
            "url = \"https://example.org/${SP_MISSING}\""
        );
        assert_eq!(substitute_env_with("${}", lookup), "${}");
        assert_eq!(substitute_env_with("tail ${open", lookup), "tail ${open");
    }

    #[test]
    fn loads_toml_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("skillport.toml");
        std::fs::write(
            &path,
            r#"
[remote]
base_url = "https://skills.example.com"
page_size = 25

[agents]
default_targets = ["claude", "codex"]

[agents.dirs]
claude = "/opt/claude/skills"

[backup]
slug_conflict_retries = 9
"#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.remote.base_url, "https://skills.example.com");
        assert_eq!(cfg.remote.page_size, 25);
        assert_eq!(cfg.agents.default_targets, vec!["claude", "codex"]);
        assert_eq!(cfg.agents.dirs["claude"], "/opt/claude/skills");
        assert_eq!(cfg.backup.slug_conflict_retries, 9);
        assert!(cfg.backup.cleanup);
    }

    #[test]
    fn loads_yaml_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("skillport.yaml");
        std::fs::write(&path, "backup:\n  keep_snapshots: true\n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert!(cfg.backup.keep_snapshots);
        assert_eq!(cfg.backup.slug_conflict_retries, 5);
    }

    #[test]
    fn rejects_unknown_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("skillport.ini");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn env_overrides_win() {
        let mut cfg = SkillportConfig::default();
        apply_env_overrides(&mut cfg, |name| match name {
            "SKILLPORT_URL" => Some("https://override.example".into()),
            "SKILLPORT_TOKEN" => Some("sk-test".into()),
            _ => None,
        });
        assert_eq!(cfg.remote.base_url, "https://override.example");
        assert_eq!(cfg.remote.token.unwrap().expose_secret(), "sk-test");
    }

    #[test]
    fn dir_overrides_set_and_clear() {
        let tmp = tempfile::tempdir().unwrap();
        set_config_dir(tmp.path().join("cfg"));
        set_data_dir(tmp.path().join("data"));
        assert_eq!(config_dir(), tmp.path().join("cfg"));
        assert_eq!(data_dir(), tmp.path().join("data"));

        clear_config_dir();
        clear_data_dir();
        assert_ne!(config_dir(), tmp.path().join("cfg"));
        assert_ne!(data_dir(), tmp.path().join("data"));
    }
}
