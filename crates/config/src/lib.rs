//! Configuration loading and well-known directories.
//!
//! Config files: `skillport.toml`, `skillport.yaml`, or `skillport.json`
//! Searched in `./` then `~/.config/skillport/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{
        apply_env_overrides, clear_config_dir, clear_data_dir, config_dir, data_dir,
        discover_and_load, load_config, set_config_dir, set_data_dir, substitute_env,
    },
    schema::{AgentsConfig, BackupConfig, InstallConfig, RemoteConfig, SkillportConfig},
};
