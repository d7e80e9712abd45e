//! Error types for the update system.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Hint appended to a failed backup rename on Windows, where the running
/// image usually holds a lock on its own file.
const WINDOWS_LOCK_HINT: &str = ". The application is probably still running and locking its \
    executable; close every Task Tracker window and try the update again";

/// Errors that can occur during update operations.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Transport-level failure talking to the release host
    #[error("network error: {0}")]
    Network(String),

    /// Release host answered with a non-success status
    #[error("release host returned status {status}")]
    Api { status: u16 },

    /// Release metadata body could not be decoded
    #[error("failed to decode release metadata: {0}")]
    Decode(String),

    /// No asset suffix mapping exists for this OS/architecture
    #[error("self-update is not supported on {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// No release asset matched the platform suffix and executable name
    #[error("no release asset found for {platform}")]
    AssetNotFound { platform: String },

    /// Archive download failed
    #[error("download failed: {0}")]
    Download(String),

    /// Archive name carries neither a `.tar.xz` nor a `.zip` suffix
    #[error("unsupported archive format: {0}")]
    UnsupportedArchiveFormat(String),

    /// Archive is corrupt or could not be unpacked
    #[error("failed to extract archive: {0}")]
    Extraction(String),

    /// Archive does not contain the expected executable
    #[error("executable '{name}' not found in archive")]
    ExecutableNotFound { name: String },

    /// The live executable could not be renamed to its backup path
    #[error("failed to rename current executable {path:?} to backup{hint}: {source}")]
    BackupRename {
        path: PathBuf,
        hint: &'static str,
        source: io::Error,
    },

    /// The new executable could not be moved into place
    #[error("failed to move new executable into place at {path:?} ({rollback}): {source}")]
    PlaceNewExecutable {
        path: PathBuf,
        rollback: RollbackOutcome,
        source: io::Error,
    },

    /// Execute permission could not be applied to the new executable
    #[error("failed to set executable permissions on {path:?}: {source}")]
    Permission { path: PathBuf, source: io::Error },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl UpdateError {
    /// Build a [`UpdateError::BackupRename`], adding the "file in use" hint when
    /// the host family is Windows.
    pub fn backup_rename(path: PathBuf, source: io::Error, windows: bool) -> Self {
        UpdateError::BackupRename {
            path,
            hint: if windows { WINDOWS_LOCK_HINT } else { "" },
            source,
        }
    }

    /// Whether a retry of the same request may succeed.
    ///
    /// Transport failures, throttling, and 5xx answers are retryable; anything
    /// the host rejected deliberately is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpdateError::Network(_) => true,
            UpdateError::Api { status } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for UpdateError {
    fn from(err: reqwest::Error) -> Self {
        UpdateError::Network(err.to_string())
    }
}

impl From<zip::result::ZipError> for UpdateError {
    fn from(err: zip::result::ZipError) -> Self {
        UpdateError::Extraction(err.to_string())
    }
}

/// Result of the best-effort rollback attempted after a failed swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The backup was renamed back over the original path
    Restored,
    /// The backup could not be restored; it is left at the backup path
    Failed(String),
}

impl fmt::Display for RollbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackOutcome::Restored => write!(f, "previous executable restored"),
            RollbackOutcome::Failed(reason) => write!(f, "rollback failed: {}", reason),
        }
    }
}
