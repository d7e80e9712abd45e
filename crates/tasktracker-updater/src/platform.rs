//! Host platform detection and the per-family capability table.
//!
//! Release assets are named after the OS/architecture pair the release host
//! uses (`linux-amd64`, `windows-arm64`, ...). Everything that differs per OS
//! family is looked up once through [`Platform::capabilities`].

use std::fmt;

use crate::archive::ArchiveFormat;
use crate::error::UpdateError;

/// OS family of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Linux,
    Darwin,
}

/// An OS/architecture pair in release-asset naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    /// Create a platform from release-asset names, e.g. `("linux", "amd64")`.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        Self::new(
            asset_os_name(std::env::consts::OS),
            asset_arch_name(std::env::consts::ARCH),
        )
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// `{os}-{arch}`
    pub fn key(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }

    /// Look up what this platform's releases look like.
    pub fn capabilities(&self) -> Result<Capabilities, UpdateError> {
        let family = match self.os.as_str() {
            "windows" => OsFamily::Windows,
            "linux" => OsFamily::Linux,
            "darwin" => OsFamily::Darwin,
            _ => {
                return Err(UpdateError::UnsupportedPlatform {
                    os: self.os.clone(),
                    arch: self.arch.clone(),
                })
            }
        };
        Ok(Capabilities::for_family(family))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Per-family behaviour of the updater.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub family: OsFamily,
    /// Container format of this family's release assets
    pub archive: ArchiveFormat,
    /// Extension carried by executables, if any
    pub executable_extension: Option<&'static str>,
}

impl Capabilities {
    pub fn for_family(family: OsFamily) -> Self {
        match family {
            OsFamily::Windows => Self {
                family,
                archive: ArchiveFormat::Zip,
                executable_extension: Some(".exe"),
            },
            OsFamily::Linux | OsFamily::Darwin => Self {
                family,
                archive: ArchiveFormat::TarXz,
                executable_extension: None,
            },
        }
    }

    pub fn is_windows(&self) -> bool {
        self.family == OsFamily::Windows
    }

    /// Asset name suffix for `platform`, e.g. `linux-amd64.tar.xz`.
    pub fn asset_suffix(&self, platform: &Platform) -> String {
        format!("{}.{}", platform.key(), self.archive.extension())
    }

    /// Name the executable has inside a release archive for this family.
    ///
    /// Windows binaries carry `.exe`; everything else has no extension, so a
    /// `.exe` taken from the running binary's name is dropped.
    pub fn expected_executable_name(&self, name: &str) -> String {
        match self.executable_extension {
            Some(ext) if name.ends_with(ext) => name.to_string(),
            Some(ext) => format!("{}{}", name, ext),
            None => name.strip_suffix(".exe").unwrap_or(name).to_string(),
        }
    }

    /// Executable name without its platform extension, used to match assets.
    pub fn executable_base_name<'a>(&self, name: &'a str) -> &'a str {
        name.strip_suffix(".exe").unwrap_or(name)
    }
}

/// Everything the updater needs to know about what it is replacing,
/// resolved once per update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTarget {
    pub platform: Platform,
    pub capabilities: Capabilities,
    /// File name of the running executable (or the configured override)
    pub executable_name: String,
}

impl UpdateTarget {
    /// Resolve the capabilities of `platform`, failing fast when the family
    /// has no release mapping.
    pub fn resolve(platform: Platform, executable_name: impl Into<String>) -> Result<Self, UpdateError> {
        let capabilities = platform.capabilities()?;
        Ok(Self {
            platform,
            capabilities,
            executable_name: executable_name.into(),
        })
    }

    pub fn asset_suffix(&self) -> String {
        self.capabilities.asset_suffix(&self.platform)
    }

    /// Name matched against asset names.
    pub fn executable_base_name(&self) -> &str {
        self.capabilities.executable_base_name(&self.executable_name)
    }

    /// Name the executable carries inside the release archive.
    pub fn archived_executable_name(&self) -> String {
        self.capabilities.expected_executable_name(&self.executable_name)
    }
}

fn asset_os_name(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn asset_arch_name(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}
