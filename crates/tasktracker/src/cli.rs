//! CLI command definitions and argument parsing

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tasktracker_updater::{
    recover_orphaned_backup, spawn_startup_check, Recovery, UpdateCheck, UpdateConfig,
    UpdateError, Updater,
};
use tracing::debug;

use crate::config::Config;
use crate::{app_version, ExitCode};

/// Task Tracker - launcher and self-updater
#[derive(Parser, Debug)]
#[command(name = "tasktracker")]
#[command(version, about = "Task Tracker - launcher and self-updater")]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(long, global = true, env = "TASKTRACKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level or filter directive (overrides RUST_LOG and the config file)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Also write daily-rotated log files to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report the running and latest versions without changing anything
    Check(TargetArgs),
    /// Download and install the latest release over the executable
    Update(TargetArgs),
    /// Repair a backup left behind by an interrupted update
    Recover(RecoverArgs),
    /// Write the default configuration file
    InitConfig(InitConfigArgs),
}

/// Which project and executable an update command works on
#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// Release host project owner (defaults to the config value)
    #[arg(long)]
    pub owner: Option<String>,

    /// Release host project name (defaults to the config value)
    #[arg(long)]
    pub repo: Option<String>,

    /// Executable to update (defaults to the running executable)
    #[arg(long)]
    pub exe: Option<PathBuf>,
}

impl TargetArgs {
    fn owner<'a>(&'a self, config: &'a UpdateConfig) -> &'a str {
        self.owner.as_deref().unwrap_or(&config.owner)
    }

    fn repo<'a>(&'a self, config: &'a UpdateConfig) -> &'a str {
        self.repo.as_deref().unwrap_or(&config.repo)
    }
}

/// Arguments for the recover command
#[derive(Args, Debug, Default)]
pub struct RecoverArgs {
    /// Executable to recover (defaults to the running executable)
    #[arg(long)]
    pub exe: Option<PathBuf>,
}

/// Arguments for the init-config command
#[derive(Args, Debug, Default)]
pub struct InitConfigArgs {
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Execute the CLI command with a pre-loaded configuration
    pub async fn execute_with_config(self, config: Config) -> anyhow::Result<ExitCode> {
        match self.command {
            Commands::Check(args) => check(&args, config.updater).await,
            Commands::Update(args) => update(args, config.updater).await,
            Commands::Recover(args) => recover(&args),
            Commands::InitConfig(args) => init_config(self.config.as_deref(), &args),
        }
    }
}

fn resolve_exe(exe: Option<&Path>) -> anyhow::Result<PathBuf> {
    match exe {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(std::env::current_exe()?),
    }
}

fn exit_code_for(err: &UpdateError) -> ExitCode {
    match err {
        UpdateError::Config(_) => ExitCode::ConfigError,
        _ => ExitCode::GeneralError,
    }
}

async fn check(args: &TargetArgs, config: UpdateConfig) -> anyhow::Result<ExitCode> {
    let exe = resolve_exe(args.exe.as_deref())?;
    let owner = args.owner(&config).to_string();
    let repo = args.repo(&config).to_string();

    let updater = match Updater::new(config, app_version()) {
        Ok(updater) => updater,
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(exit_code_for(&e));
        }
    };

    if app_version() == tasktracker_updater::DEV_VERSION {
        println!("Note: this is a development build; automatic updates are skipped.");
    }

    match updater.check_for_updates(&owner, &repo, &exe).await {
        Ok(UpdateCheck::UpToDate { current, latest }) => {
            println!("Current version: {current}");
            println!("Latest release:  {latest}");
            println!("Status:          up to date");
            Ok(ExitCode::Success)
        }
        Ok(UpdateCheck::Available(plan)) => {
            println!("Current version: {}", plan.current_version);
            println!("Latest release:  {}", plan.latest_tag);
            println!("Asset:           {}", plan.asset.name);
            println!("Status:          update available");
            Ok(ExitCode::Success)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            Ok(exit_code_for(&e))
        }
    }
}

async fn update(args: TargetArgs, config: UpdateConfig) -> anyhow::Result<ExitCode> {
    let exe = resolve_exe(args.exe.as_deref())?;
    let owner = args.owner(&config).to_string();
    let repo = args.repo(&config).to_string();

    let updater = match Updater::new(config, app_version()) {
        Ok(updater) => updater,
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(exit_code_for(&e));
        }
    };

    debug!("Updating {:?} from {}/{}", exe, owner, repo);
    let outcome = spawn_startup_check(Arc::new(updater), owner, repo, exe).await?;
    println!("{outcome}");

    if outcome.is_failure() {
        Ok(ExitCode::GeneralError)
    } else {
        Ok(ExitCode::Success)
    }
}

fn recover(args: &RecoverArgs) -> anyhow::Result<ExitCode> {
    let exe = resolve_exe(args.exe.as_deref())?;
    match recover_orphaned_backup(&exe)? {
        Recovery::Nothing => println!("Nothing to recover for {}", exe.display()),
        Recovery::Restored => println!("Restored {} from its backup", exe.display()),
        Recovery::Removed => println!("Removed leftover backup of {}", exe.display()),
        Recovery::StillLocked(reason) => {
            println!("Backup of {} is still in use: {reason}", exe.display())
        }
    }
    Ok(ExitCode::Success)
}

fn init_config(custom_path: Option<&Path>, args: &InitConfigArgs) -> anyhow::Result<ExitCode> {
    match Config::write_default(custom_path, args.force) {
        Ok(path) => {
            println!("Wrote default configuration to {}", path.display());
            Ok(ExitCode::Success)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            Ok(ExitCode::ConfigError)
        }
    }
}
