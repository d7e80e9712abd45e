//! # tasktracker-updater
//!
//! Self-update system for Task Tracker.
//!
//! This crate handles:
//! - Latest-release lookup against the release host's API
//! - Version comparison of release tags (dotted numeric, optionally semver)
//! - Streaming archive download into a scoped temporary directory
//! - Executable extraction from `.tar.xz` and `.zip` archives
//! - In-place replacement of the running executable with rollback
//!
//! ## Platforms
//!
//! Per-platform behaviour comes from one capability table
//! ([`platform::Capabilities`]). Linux and macOS releases ship as `.tar.xz`,
//! Windows releases as `.zip` holding an `.exe`. Other platforms fail fast
//! with [`UpdateError::UnsupportedPlatform`] before any network access.
//!
//! ## Failure handling
//!
//! [`Updater::run`] never returns an error, so an update failure cannot stop
//! the application from starting. A failed swap is rolled back on a best
//! effort basis, and [`recover_orphaned_backup`] repairs whatever an
//! interrupted update left next to the executable.

pub mod archive;
pub mod config;
pub mod download;
pub mod error;
mod http;
pub mod manager;
pub mod platform;
#[cfg(test)]
mod proptests;
pub mod release;
pub mod replace;
pub mod version;

// Re-export main types for convenience
pub use archive::{extract_executable, ArchiveFormat};
pub use config::{NetworkConfig, UpdateConfig};
pub use download::{DownloadProgress, Downloader};
pub use error::{RollbackOutcome, UpdateError};
pub use manager::{
    spawn_startup_check, UpdateCheck, UpdateOutcome, UpdatePlan, UpdateState, Updater,
};
pub use platform::{Capabilities, OsFamily, Platform, UpdateTarget};
pub use release::{AssetDescriptor, LatestRelease, ReleaseClient, ReleaseDescriptor};
pub use replace::{backup_path, recover_orphaned_backup, ExecutableReplacer, Recovery};
pub use version::{compare_versions, VersionScheme, VersionTuple, DEV_VERSION};
