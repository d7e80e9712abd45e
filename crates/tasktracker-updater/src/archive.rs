//! Release archive extraction.
//!
//! Release archives hold a single executable. Extraction walks the archive,
//! copies the first regular file whose base name equals the expected
//! executable name, and stops.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::UpdateError;

/// Container formats release assets are published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// xz-compressed tarball
    TarXz,
    /// zip archive
    Zip,
}

impl ArchiveFormat {
    /// File extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::TarXz => "tar.xz",
            ArchiveFormat::Zip => "zip",
        }
    }

    /// Detect the format from an archive's file name suffix.
    pub fn from_file_name(name: &str) -> Result<Self, UpdateError> {
        if name.ends_with(".tar.xz") {
            Ok(ArchiveFormat::TarXz)
        } else if name.ends_with(".zip") {
            Ok(ArchiveFormat::Zip)
        } else {
            Err(UpdateError::UnsupportedArchiveFormat(name.to_string()))
        }
    }
}

/// Extract the executable named `expected_name` from `archive_path` into
/// `dest_dir/expected_name`, preserving the archived file mode.
pub fn extract_executable(
    archive_path: &Path,
    dest_dir: &Path,
    expected_name: &str,
) -> Result<PathBuf, UpdateError> {
    let archive_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format = ArchiveFormat::from_file_name(&archive_name)?;
    let dest = dest_dir.join(expected_name);

    info!("Extracting {} from {:?}", expected_name, archive_path);
    let found = match format {
        ArchiveFormat::TarXz => extract_from_tar_xz(archive_path, &dest, expected_name)?,
        ArchiveFormat::Zip => extract_from_zip(archive_path, &dest, expected_name)?,
    };

    if !found {
        return Err(UpdateError::ExecutableNotFound {
            name: expected_name.to_string(),
        });
    }

    debug!("Extracted executable to {:?}", dest);
    Ok(dest)
}

fn extract_from_tar_xz(
    archive_path: &Path,
    dest: &Path,
    expected_name: &str,
) -> Result<bool, UpdateError> {
    let file = File::open(archive_path)?;
    let decoder = xz2::read::XzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);

    for entry in archive.entries().map_err(extraction_error)? {
        let mut entry = entry.map_err(extraction_error)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .map_err(extraction_error)?
            .file_name()
            .is_some_and(|name| name == OsStr::new(expected_name));
        if !matches {
            continue;
        }

        let mode = entry.header().mode().map_err(extraction_error)?;
        write_entry(&mut entry, dest, Some(mode))?;
        return Ok(true);
    }

    Ok(false)
}

fn extract_from_zip(
    archive_path: &Path,
    dest: &Path,
    expected_name: &str,
) -> Result<bool, UpdateError> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if !entry.is_file() {
            continue;
        }

        let matches = Path::new(entry.name())
            .file_name()
            .is_some_and(|name| name == OsStr::new(expected_name));
        if !matches {
            continue;
        }

        let mode = entry.unix_mode();
        write_entry(&mut entry, dest, mode)?;
        return Ok(true);
    }

    Ok(false)
}

/// Copy an archive entry to `dest` byte for byte and apply `mode`.
fn write_entry<R: Read>(entry: &mut R, dest: &Path, mode: Option<u32>) -> Result<(), UpdateError> {
    let mut out = File::create(dest)?;
    io::copy(entry, &mut out).map_err(extraction_error)?;
    out.sync_all()?;
    drop(out);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = mode {
            std::fs::set_permissions(dest, std::fs::Permissions::from_mode(mode & 0o7777))?;
        }
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

fn extraction_error(err: io::Error) -> UpdateError {
    UpdateError::Extraction(err.to_string())
}
