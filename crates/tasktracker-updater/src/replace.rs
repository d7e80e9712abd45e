//! In-place replacement of the running executable.
//!
//! The swap is two renames: the live executable moves to `<exe>.old`, then
//! the new executable moves to `<exe>`. A crash between the two leaves only
//! the backup, which [`recover_orphaned_backup`] puts back on the next start.
//!
//! ## Windows
//!
//! A running image is usually locked, so the first rename is where Windows
//! updates fail (reported as [`UpdateError::BackupRename`] with a hint to
//! close the application). When it does succeed, the backup may still be
//! mapped by the running process, so it is left in place after the swap and
//! only cleaned up by a later start. Nothing guarantees that cleanup.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::error::{RollbackOutcome, UpdateError};
use crate::platform::Capabilities;

/// Suffix appended to the executable path for the backup copy.
pub const BACKUP_SUFFIX: &str = ".old";

/// Name prefix of the staging file used for cross-filesystem moves.
const STAGING_PREFIX: &str = ".tasktracker-staged-";

/// Serializes every operation touching the running executable's file.
static REPLACE_LOCK: Mutex<()> = Mutex::new(());

/// `<exe>.old` for `exe`.
pub fn backup_path(exe: &Path) -> PathBuf {
    let mut name = OsString::from(exe.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Swaps the running executable for a new one.
#[derive(Debug, Clone, Copy)]
pub struct ExecutableReplacer {
    capabilities: Capabilities,
}

impl ExecutableReplacer {
    pub fn new(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }

    /// Replace `old_path` with the file at `new_path`.
    ///
    /// If moving the new file into place fails, the backup is renamed back
    /// over `old_path` before the error is returned. That rollback is best
    /// effort: its outcome is attached to the error, never raised on its own.
    pub fn replace(&self, old_path: &Path, new_path: &Path) -> Result<(), UpdateError> {
        let _guard = REPLACE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let windows = self.capabilities.is_windows();
        let backup = backup_path(old_path);

        info!("Replacing executable: {:?} -> {:?}", new_path, old_path);

        fs::rename(old_path, &backup)
            .map_err(|e| UpdateError::backup_rename(old_path.to_path_buf(), e, windows))?;
        debug!("Moved current executable to {:?}", backup);

        if let Err(e) = move_file(new_path, old_path) {
            warn!("Failed to move new executable into place: {}", e);
            let rollback = match fs::rename(&backup, old_path) {
                Ok(()) => {
                    info!("Restored previous executable from {:?}", backup);
                    RollbackOutcome::Restored
                }
                Err(rollback_err) => {
                    warn!(
                        "Rollback failed, previous executable left at {:?}: {}",
                        backup, rollback_err
                    );
                    RollbackOutcome::Failed(rollback_err.to_string())
                }
            };
            return Err(UpdateError::PlaceNewExecutable {
                path: old_path.to_path_buf(),
                rollback,
                source: e,
            });
        }

        if windows {
            info!(
                "Previous executable left at {:?}; it is removed on a later start",
                backup
            );
            return Ok(());
        }

        set_executable(old_path)?;

        if let Err(e) = fs::remove_file(&backup) {
            warn!("Failed to remove backup {:?}: {}", backup, e);
        }

        debug!("Executable replaced successfully");
        Ok(())
    }
}

/// What [`recover_orphaned_backup`] found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// No backup next to the executable
    Nothing,
    /// The executable was missing and the backup was renamed back
    Restored,
    /// A leftover backup from a finished update was deleted
    Removed,
    /// A leftover backup exists but could not be deleted yet
    StillLocked(String),
}

/// Repair the state left by an interrupted or Windows-finalized update.
///
/// Call once at start-up, before any update check runs.
pub fn recover_orphaned_backup(exe_path: &Path) -> Result<Recovery, UpdateError> {
    let _guard = REPLACE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let backup = backup_path(exe_path);

    if !backup.exists() {
        return Ok(Recovery::Nothing);
    }

    if !exe_path.exists() {
        warn!(
            "Executable {:?} missing after an interrupted update, restoring backup",
            exe_path
        );
        fs::rename(&backup, exe_path)?;
        return Ok(Recovery::Restored);
    }

    match fs::remove_file(&backup) {
        Ok(()) => {
            info!("Removed leftover backup {:?}", backup);
            Ok(Recovery::Removed)
        }
        Err(e) => {
            debug!("Leftover backup {:?} not removable yet: {}", backup, e);
            Ok(Recovery::StillLocked(e.to_string()))
        }
    }
}

/// Rename `from` to `to`, copying when they sit on different filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!("{:?} and {:?} are on different filesystems, copying", from, to);
            copy_into_place(from, to)?;
            if let Err(e) = fs::remove_file(from) {
                debug!("Failed to remove {:?} after copy: {}", from, e);
            }
            Ok(())
        }
        other => other,
    }
}

/// Copy `from` to a staging file next to `to`, then rename it over `to`.
///
/// `to` only ever holds a complete file: a crash mid-copy leaves the partial
/// copy under the staging name, never under `to`.
fn copy_into_place(from: &Path, to: &Path) -> io::Result<()> {
    let dir = match to.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile_in(dir)?;

    let mut source = fs::File::open(from)?;
    io::copy(&mut source, staged.as_file_mut())?;
    staged
        .as_file()
        .set_permissions(source.metadata()?.permissions())?;
    staged.as_file().sync_all()?;

    staged.persist(to).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), UpdateError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| {
        UpdateError::Permission {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), UpdateError> {
    Ok(())
}
