//! Version comparison.
//!
//! Release tags are compared as dotted numeric tuples: an optional leading
//! `v` is dropped, every `.`-separated component is read as an unsigned
//! integer (anything unparsable counts as `0`) and missing trailing
//! components are zero, so `1.2` equals `1.2.0`. There is no notion of
//! pre-release or build metadata under this scheme; [`VersionScheme::Semver`]
//! opts into it explicitly.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Version string reserved for development builds, which never self-update.
pub const DEV_VERSION: &str = "dev";

/// A version decomposed into its numeric components.
#[derive(Debug, Clone)]
pub struct VersionTuple(Vec<u64>);

impl VersionTuple {
    /// Parse a version string. Never fails.
    pub fn parse(version: &str) -> Self {
        let trimmed = version.strip_prefix('v').unwrap_or(version);
        let parts = trimmed
            .split('.')
            .map(|part| part.parse::<u64>().unwrap_or(0))
            .collect();
        Self(parts)
    }

    fn component(&self, index: usize) -> u64 {
        self.0.get(index).copied().unwrap_or(0)
    }
}

impl Ord for VersionTuple {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for VersionTuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality must agree with `Ord`, which pads with zeros.
impl PartialEq for VersionTuple {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionTuple {}

/// Compare two version strings with the dotted numeric scheme.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    VersionTuple::parse(a).cmp(&VersionTuple::parse(b))
}

/// How release tags are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionScheme {
    /// Dotted numeric tuples ([`compare_versions`])
    #[default]
    Dotted,
    /// Semantic versioning including pre-release precedence
    Semver,
}

impl VersionScheme {
    /// Compare `a` with `b` under this scheme.
    ///
    /// The semver scheme falls back to dotted comparison when either side
    /// is not a valid semantic version.
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            VersionScheme::Dotted => compare_versions(a, b),
            VersionScheme::Semver => match (parse_semver(a), parse_semver(b)) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => {
                    debug!("'{}' or '{}' is not semver, comparing as dotted", a, b);
                    compare_versions(a, b)
                }
            },
        }
    }
}

fn parse_semver(version: &str) -> Option<semver::Version> {
    let trimmed = version.strip_prefix('v').unwrap_or(version);
    semver::Version::parse(trimmed).ok()
}
