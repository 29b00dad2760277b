//! obsflow command-line interface.
//!
//! ```text
//! obsflow init-config [--config obsflow.toml]
//! obsflow run [--config obsflow.toml] [--namespace NS] [--collection C] [--run-index N]
//! obsflow register [--namespace NS] <artifact>...
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::{Args, Parser, Subcommand};

use obsflow_core::collaborators::{
    register_artifact, CommandRegistry, CommandSimulator, WscleanImager,
};
use obsflow_core::config::{ConfigManager, Settings};
use obsflow_core::ids::user_identity;
use obsflow_core::logging::{init_tracing, LogConfig, LogLevel, RunLogger};
use obsflow_core::orchestrator::{
    policy_from_settings, resolve_run_index, run_standard, Context, RunState,
};

const DEFAULT_CONFIG: &str = "obsflow.toml";

#[derive(Parser, Debug)]
#[command(name = "obsflow", version)]
#[command(about = "Simulate, image and describe radio-interferometric observations")]
struct Cli {
    /// Log level for stderr output (RUST_LOG wins when set)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run simulate → describe → dirty image → describe → clean → describe
    Run(RunArgs),
    /// Register the `.meta` sidecars of existing artifacts
    Register(RegisterArgs),
    /// Write a configuration file with default values
    InitConfig {
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Configuration file (created with defaults if missing)
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Data-management namespace
    #[arg(long)]
    namespace: Option<String>,

    /// ObsCore collection, overriding the instrument default
    #[arg(long)]
    collection: Option<String>,

    /// Fixed run index instead of the persisted counter
    #[arg(long)]
    run_index: Option<u64>,

    /// Output root directory
    #[arg(long)]
    output_root: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RegisterArgs {
    /// Data-management namespace (defaults to the configured one)
    #[arg(long)]
    namespace: Option<String>,

    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Artifacts whose `<artifact>.meta` sidecar is registered
    #[arg(required = true)]
    artifacts: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => run(args, cli.log_level),
        Command::Register(args) => register(args, cli.log_level),
        Command::InitConfig { config, force } => init_config(&config, force),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &Path) -> Result<ConfigManager> {
    let mut manager = ConfigManager::new(path);
    manager
        .load_or_create()
        .with_context(|| format!("loading {}", path.display()))?;
    Ok(manager)
}

/// Read the config if present; never creates or rewrites it.
fn read_config(path: &Path) -> Result<ConfigManager> {
    let mut manager = ConfigManager::new(path);
    let found = manager
        .load_or_default()
        .with_context(|| format!("reading {}", path.display()))?;
    if !found {
        tracing::debug!("No config at {}; using defaults", path.display());
    }
    Ok(manager)
}

fn run(args: RunArgs, log_level: Option<LogLevel>) -> Result<()> {
    let mut manager = load_config(&args.config)?;
    {
        let settings = manager.settings_mut();
        if let Some(namespace) = args.namespace {
            settings.metadata.namespace = namespace;
        }
        if let Some(collection) = args.collection {
            settings.metadata.collection = Some(collection);
        }
        if let Some(index) = args.run_index {
            settings.metadata.run_index = Some(index);
        }
        if let Some(root) = args.output_root {
            settings.paths.output_root = root.to_string_lossy().into_owned();
        }
    }

    let settings: Settings = manager.settings().clone();
    init_tracing(log_level.unwrap_or(settings.logging.level));
    settings.validate().context("invalid configuration")?;
    manager
        .ensure_dirs_exist()
        .context("creating output directories")?;

    let output_root = manager.output_root();
    let user_seed = user_identity();
    if user_seed.is_none() {
        tracing::warn!("No user name in the environment; using the default identifier seed");
    }
    let run_index = resolve_run_index(&settings, &output_root, user_seed.as_deref())
        .context("allocating run index")?;

    let run_name = format!("{}run{}", settings.paths.name_prefix, run_index);
    let logger = Arc::new(
        RunLogger::new(
            &run_name,
            manager.logs_folder(),
            LogConfig::from(&settings.logging),
        )
        .context("creating run log")?,
    );
    tracing::info!("Run {} logging to {}", run_name, logger.log_path().display());

    let ctx = Context::new(
        settings.clone(),
        &run_name,
        output_root,
        Arc::clone(&logger),
        Arc::new(CommandSimulator::from_settings(&settings.simulation)),
        Arc::new(WscleanImager::from_settings(&settings.imaging)),
    )
    .with_policy(policy_from_settings(&settings.metadata, user_seed, run_index));

    let mut state = RunState::new(&run_name, run_index);
    let result = run_standard(&ctx, &mut state);
    logger.flush();
    result?;

    for sidecar in &state.sidecars {
        println!("{}", sidecar.display());
    }
    Ok(())
}

fn register(args: RegisterArgs, log_level: Option<LogLevel>) -> Result<()> {
    let manager = read_config(&args.config)?;
    let settings = manager.settings();
    init_tracing(log_level.unwrap_or(settings.logging.level));

    let namespace = args
        .namespace
        .unwrap_or_else(|| settings.metadata.namespace.clone());
    let logger = RunLogger::new(
        "register",
        manager.logs_folder(),
        LogConfig::from(&settings.logging),
    )
    .context("creating registration log")?;
    let registry = CommandRegistry::from_settings(&settings.registry);

    let mut failed = 0usize;
    for artifact in &args.artifacts {
        match register_artifact(&registry, &namespace, artifact, &logger) {
            Ok(()) => println!("Metadata set successfully for {}", artifact.display()),
            Err(e) => {
                failed += 1;
                eprintln!("Failed to set metadata for {}: {}", artifact.display(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} registrations failed", failed, args.artifacts.len());
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    ConfigManager::new(path)
        .save()
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "obsflow",
            "run",
            "--namespace",
            "sdc3",
            "--collection",
            "MRO/MWA",
            "--run-index",
            "4",
        ])
        .unwrap();

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.namespace.as_deref(), Some("sdc3"));
                assert_eq!(args.collection.as_deref(), Some("MRO/MWA"));
                assert_eq!(args.run_index, Some(4));
                assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn register_requires_an_artifact() {
        assert!(Cli::try_parse_from(["obsflow", "register"]).is_err());
        assert!(Cli::try_parse_from(["obsflow", "register", "/data/run1.MS"]).is_ok());
    }

    #[test]
    fn register_config_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG);

        let manager = read_config(&path).unwrap();
        assert_eq!(manager.settings().metadata.namespace, "testing");
        assert!(!path.exists());
    }

    #[test]
    fn log_level_is_global() {
        let cli = Cli::try_parse_from(["obsflow", "init-config", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
    }
}
