mod backup_commands;
mod install_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "skillport", about = "Skillport: back up and sync agent skills")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides default ~/.config/skillport/).
    #[arg(long, global = true, env = "SKILLPORT_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
    /// Custom data directory (holds installed skills, plans, snapshots).
    #[arg(long, global = true, env = "SKILLPORT_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan local skill folders and write a backup plan.
    Plan {
        /// Back up one directory (it and its children) instead of agent dirs.
        #[arg(long, conflicts_with = "agents")]
        source_dir: Option<PathBuf>,
        /// Comma-separated agent ids to scan (default: all known agents).
        #[arg(long, value_delimiter = ',')]
        agents: Option<Vec<String>>,
        /// Where to write the plan (default: timestamped file in the data dir).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Execute a previously written backup plan.
    Apply {
        /// Plan file written by `skillport plan`.
        plan: PathBuf,
        /// Keep the snapshot directory even if every item succeeded.
        #[arg(long)]
        keep_snapshot: bool,
        /// Leave backed-up local folders in place.
        #[arg(long)]
        no_cleanup: bool,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Install every owned private skill and prune ones deleted remotely.
    Sync {
        /// Comma-separated agent ids to place skills into.
        #[arg(long, value_delimiter = ',')]
        agents: Option<Vec<String>>,
        #[arg(long)]
        json: bool,
    },
    /// Install one remote skill by id or slug.
    Install {
        skill: String,
        #[arg(long, value_delimiter = ',')]
        agents: Option<Vec<String>>,
        /// Copy into agent directories instead of symlinking.
        #[arg(long)]
        copy: bool,
    },
    /// Remove an installed skill folder from every agent directory.
    Uninstall {
        /// Folder name as shown by `skillport lock`.
        folder: String,
    },
    /// Show the install lock.
    Lock {
        #[arg(long)]
        json: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    if let Some(ref dir) = cli.config_dir {
        skillport_config::set_config_dir(dir.clone());
    }
    if let Some(ref dir) = cli.data_dir {
        skillport_config::set_data_dir(dir.clone());
    }
    let config = skillport_config::discover_and_load();
    debug!(version = env!("CARGO_PKG_VERSION"), "skillport starting");

    match cli.command {
        Commands::Plan {
            source_dir,
            agents,
            output,
            json,
        } => backup_commands::handle_plan(&config, source_dir, agents, output, json).await,
        Commands::Apply {
            plan,
            keep_snapshot,
            no_cleanup,
            json,
        } => backup_commands::handle_apply(&config, &plan, keep_snapshot, no_cleanup, json).await,
        Commands::Sync { agents, json } => install_commands::handle_sync(&config, agents, json).await,
        Commands::Install {
            skill,
            agents,
            copy,
        } => install_commands::handle_install(&config, &skill, agents, copy).await,
        Commands::Uninstall { folder } => install_commands::handle_uninstall(&config, &folder),
        Commands::Lock { json } => install_commands::handle_lock(json),
    }
}

/// HTTP client for the configured store.
fn repository(
    config: &skillport_config::SkillportConfig,
) -> anyhow::Result<skillport_remote::HttpSkillRepository> {
    Ok(
        skillport_remote::HttpSkillRepository::new(
            &config.remote.base_url,
            config.remote.token.clone(),
        )?
        .with_page_size(config.remote.page_size),
    )
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn agents_are_comma_separated() {
        let cli = Cli::try_parse_from(["skillport", "sync", "--agents", "claude,codex"]).unwrap();
        match cli.command {
            Commands::Sync { agents, json } => {
                assert_eq!(agents.unwrap(), vec!["claude", "codex"]);
                assert!(!json);
            },
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn source_dir_and_agents_conflict() {
        assert!(
            Cli::try_parse_from(["skillport", "plan", "--source-dir", "/x", "--agents", "claude"])
                .is_err()
        );
    }

    #[test]
    fn apply_flags() {
        let cli = Cli::try_parse_from([
            "skillport",
            "apply",
            "plan.json",
            "--keep-snapshot",
            "--no-cleanup",
        ])
        .unwrap();
        match cli.command {
            Commands::Apply {
                plan,
                keep_snapshot,
                no_cleanup,
                json,
            } => {
                assert_eq!(plan, PathBuf::from("plan.json"));
                assert!(keep_snapshot && no_cleanup && !json);
            },
            _ => panic!("expected apply"),
        }
    }
}
