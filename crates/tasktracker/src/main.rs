//! Task Tracker entry point

use clap::Parser;
use tasktracker::cli::Commands;
use tasktracker::{logging, Cli, Config, ExitCode};
use tracing::info;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    // init-config must work even when the existing file is broken
    let config = if matches!(cli.command, Commands::InitConfig(_)) {
        Config::default()
    } else {
        match Config::load_from(cli.config.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::ConfigError.to_exit_code();
            }
        }
    };

    let filter = logging::build_filter(cli.log_level.as_deref(), &config.logging.level);
    let log_dir = cli.log_dir.clone().or_else(|| config.logging.directory.clone());
    let _guard = logging::init(filter, log_dir.as_deref());

    info!("tasktracker {} starting", tasktracker::app_version());

    match cli.execute_with_config(config).await {
        Ok(code) => code.to_exit_code(),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::GeneralError.to_exit_code()
        }
    }
}
