//! Repository adapter interface.
//!
//! The resolver never talks to a package index directly. It asks a
//! [`Repository`] for candidates, dependencies and artifact hashes; the
//! adapter owns networking, builds, caching, timeouts and retries.

use crate::requirement::{Requirement, RequirementSource};
use lockwright_core::{PackageName, Result, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A concrete option for satisfying a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    /// Package name.
    pub name: PackageName,
    /// Version offered.
    pub version: Version,
    /// Where it comes from.
    pub source: RequirementSource,
}

impl Candidate {
    /// A registry candidate.
    #[must_use]
    pub const fn registry(name: PackageName, version: Version) -> Self {
        Self {
            name,
            version,
            source: RequirementSource::Registry,
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source.url() {
            Some(url) => write!(f, "{}=={} ({url})", self.name, self.version),
            None => write!(f, "{}=={}", self.name, self.version),
        }
    }
}

/// Index configuration passed through to adapters and the lockfile writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    /// Primary index URL (`None` means the adapter's default).
    pub index_url: Option<String>,
    /// Additional index URLs.
    pub extra_index_urls: Vec<String>,
    /// Hosts trusted without TLS verification.
    pub trusted_hosts: Vec<String>,
    /// Local directories or pages to search for archives.
    pub find_links: Vec<String>,
    /// Consider pre-releases for every requirement.
    pub allow_prereleases: bool,
}

/// Package metadata source consumed by the resolver.
///
/// Implementations must be safe to call from several threads; the resolver
/// never calls `get_dependencies` or `find_best_candidate` for the same name
/// concurrently, but hash collection calls `get_hashes` in parallel.
pub trait Repository: Send + Sync {
    /// Highest-priority candidate satisfying `requirement`, skipping
    /// `excluded` versions.
    ///
    /// Returns `Ok(None)` when nothing matches.
    fn find_best_candidate(
        &self,
        requirement: &Requirement,
        excluded: &BTreeSet<Version>,
    ) -> Result<Option<Candidate>>;

    /// Direct dependencies of a pinned or direct-source requirement.
    ///
    /// The requirement's extras select optional dependency groups. Fails
    /// with [`lockwright_core::Error::NotPinned`] for an unpinned registry
    /// requirement and with
    /// [`lockwright_core::Error::DependencyResolutionFailed`] when metadata
    /// discovery fails.
    fn get_dependencies(&self, requirement: &Requirement) -> Result<Vec<Requirement>>;

    /// Hashes (`algorithm:hex`) of every compatible artifact of a pinned
    /// requirement. Direct sources have no fixed artifact and return an empty
    /// set.
    fn get_hashes(&self, requirement: &Requirement) -> Result<BTreeSet<String>>;
}

impl<R: Repository + ?Sized> Repository for Arc<R> {
    fn find_best_candidate(
        &self,
        requirement: &Requirement,
        excluded: &BTreeSet<Version>,
    ) -> Result<Option<Candidate>> {
        (**self).find_best_candidate(requirement, excluded)
    }

    fn get_dependencies(&self, requirement: &Requirement) -> Result<Vec<Requirement>> {
        (**self).get_dependencies(requirement)
    }

    fn get_hashes(&self, requirement: &Requirement) -> Result<BTreeSet<String>> {
        (**self).get_hashes(requirement)
    }
}

impl<R: Repository + ?Sized> Repository for &R {
    fn find_best_candidate(
        &self,
        requirement: &Requirement,
        excluded: &BTreeSet<Version>,
    ) -> Result<Option<Candidate>> {
        (**self).find_best_candidate(requirement, excluded)
    }

    fn get_dependencies(&self, requirement: &Requirement) -> Result<Vec<Requirement>> {
        (**self).get_dependencies(requirement)
    }

    fn get_hashes(&self, requirement: &Requirement) -> Result<BTreeSet<String>> {
        (**self).get_hashes(requirement)
    }
}

/// Pick the preferred version among `versions` that `requirement` accepts.
///
/// Pre-releases are only chosen when `allow_prereleases` is set, when the
/// specifier names a pre-release, or when no final release matches.
pub fn select_version<'a>(
    requirement: &Requirement,
    versions: impl IntoIterator<Item = &'a Version>,
    excluded: &BTreeSet<Version>,
    allow_prereleases: bool,
) -> Option<&'a Version> {
    let allow = allow_prereleases || requirement.specifier.mentions_prerelease();
    let mut best_final: Option<&Version> = None;
    let mut best_any: Option<&Version> = None;

    for version in versions {
        if excluded.contains(version) || !requirement.specifier.contains(version) {
            continue;
        }
        if best_any.is_none_or(|best| version > best) {
            best_any = Some(version);
        }
        if !version.is_prerelease() && best_final.is_none_or(|best| version > best) {
            best_final = Some(version);
        }
    }

    if allow { best_any } else { best_final.or(best_any) }
}
