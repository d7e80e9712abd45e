//! Task Tracker launcher
//!
//! This crate provides the host binary's start-up plumbing:
//! - Loading the `[updater]` and `[logging]` configuration
//! - Installing the tracing subscriber (stderr plus optional rolling file)
//! - Running the self-update check in the background at launch
//! - Operator commands to check, update, and recover the executable

pub mod cli;
pub mod config;
pub mod logging;

pub use cli::Cli;
pub use config::{Config, ConfigError};

use tasktracker_updater::DEV_VERSION;

/// Version of this build, injected at compile time through
/// `TASKTRACKER_VERSION`. Builds without it are development builds and never
/// self-update.
pub fn app_version() -> &'static str {
    option_env!("TASKTRACKER_VERSION").unwrap_or(DEV_VERSION)
}

/// Exit codes for CLI operations
///
/// - 0: Success - operation completed successfully
/// - 1: General error - the command or the update failed
/// - 2: Configuration error - the configuration could not be loaded or is invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Operation completed successfully (exit code 0)
    Success = 0,
    /// General error (exit code 1)
    GeneralError = 1,
    /// Configuration error (exit code 2)
    ConfigError = 2,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    /// Get the exit code name as a string
    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::GeneralError => "GENERAL_ERROR",
            ExitCode::ConfigError => "CONFIG_ERROR",
        }
    }

    /// Get a human-readable description of the exit code
    pub fn description(&self) -> &'static str {
        match self {
            ExitCode::Success => "Operation completed successfully",
            ExitCode::GeneralError => "The command or the update failed",
            ExitCode::ConfigError => "Configuration missing or invalid",
        }
    }
}
