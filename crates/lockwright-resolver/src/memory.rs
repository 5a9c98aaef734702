//! In-memory repository.
//!
//! [`MemoryRepository`] holds releases, optional dependency groups, artifacts
//! and direct sources in process memory. It backs the test suites and works
//! as an offline adapter over a pre-fetched index snapshot.

use crate::repository::{Candidate, IndexOptions, Repository, select_version};
use crate::requirement::{Requirement, RequirementSource};
use crate::tags::TargetTags;
use ahash::AHashMap;
use lockwright_core::{Error, PackageName, Result, Version};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace, warn};

/// A distribution file of a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File name (`pkg-1.0-py3-none-any.whl`).
    pub filename: String,
    /// Content hash, `algorithm:hex`.
    pub hash: String,
}

impl Artifact {
    /// An artifact with a known hash.
    #[must_use]
    pub fn new(filename: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            hash: hash.into(),
        }
    }

    /// An artifact hashed from its content with SHA-256.
    #[must_use]
    pub fn from_bytes(filename: impl Into<String>, content: &[u8]) -> Self {
        Self::new(filename, sha256_hash(content))
    }
}

/// `sha256:<hex>` digest of `content`.
#[must_use]
pub fn sha256_hash(content: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(content)))
}

/// A published release of a package.
#[derive(Debug, Clone)]
pub struct Release {
    /// Release version.
    pub version: Version,
    /// Unconditional dependencies.
    pub dependencies: Vec<Requirement>,
    /// Optional dependency groups by extra name.
    pub extras: BTreeMap<String, Vec<Requirement>>,
    /// Distribution files.
    pub artifacts: Vec<Artifact>,
}

impl Release {
    fn new(version: Version) -> Self {
        Self {
            version,
            dependencies: Vec::new(),
            extras: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }

    /// A release without artifacts is assumed to be installable from source.
    fn is_available(&self, tags: &TargetTags) -> bool {
        self.artifacts.is_empty()
            || self
                .artifacts
                .iter()
                .any(|artifact| tags.is_compatible(&artifact.filename))
    }
}

/// A project reachable through a VCS or local source.
#[derive(Debug, Clone)]
struct DirectSource {
    name: PackageName,
    version: Version,
    dependencies: Vec<Requirement>,
    extras: BTreeMap<String, Vec<Requirement>>,
    failure: Option<String>,
}

/// Repository backed by in-process maps.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    releases: RwLock<AHashMap<PackageName, Vec<Release>>>,
    direct: RwLock<AHashMap<String, DirectSource>>,
    tags: TargetTags,
    options: IndexOptions,
}

impl MemoryRepository {
    /// An empty repository accepting pure-Python artifacts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty repository for the given target tags and index options.
    #[must_use]
    pub fn with_target(tags: TargetTags, options: IndexOptions) -> Self {
        Self {
            tags,
            options,
            ..Self::default()
        }
    }

    /// Target tags used for artifact filtering.
    #[must_use]
    pub const fn target_tags(&self) -> &TargetTags {
        &self.tags
    }

    /// Index options this repository was configured with.
    #[must_use]
    pub const fn index_options(&self) -> &IndexOptions {
        &self.options
    }

    /// Add a release with dependency lines such as `"bar>=1.0,<2.0"`.
    ///
    /// Adding an existing version replaces its dependencies and keeps its
    /// extras and artifacts.
    pub fn add_release(&self, name: &str, version: &str, dependencies: &[&str]) -> Result<()> {
        let name: PackageName = name.parse()?;
        let version: Version = version.parse()?;
        let dependencies = parse_lines(dependencies)?;

        let mut releases = self.releases.write();
        let entry = releases.entry(name.clone()).or_default();
        match entry.iter_mut().find(|release| release.version == version) {
            Some(release) => release.dependencies = dependencies,
            None => {
                let mut release = Release::new(version);
                release.dependencies = dependencies;
                entry.push(release);
                entry.sort_by(|a, b| b.version.cmp(&a.version));
            }
        }
        trace!(package = %name, "release added");
        Ok(())
    }

    /// Add an optional dependency group to an existing release.
    pub fn add_extra(
        &self,
        name: &str,
        version: &str,
        extra: &str,
        dependencies: &[&str],
    ) -> Result<()> {
        let extra = normalized_extra(extra)?;
        let dependencies = parse_lines(dependencies)?;
        self.with_release(name, version, |release| {
            release.extras.insert(extra, dependencies);
        })
    }

    /// Attach an artifact to an existing release.
    pub fn add_artifact(&self, name: &str, version: &str, artifact: Artifact) -> Result<()> {
        self.with_release(name, version, |release| release.artifacts.push(artifact))
    }

    /// Register a VCS or local source providing `name==version`.
    pub fn add_direct_source(
        &self,
        url: &str,
        name: &str,
        version: &str,
        dependencies: &[&str],
    ) -> Result<()> {
        let source = DirectSource {
            name: name.parse()?,
            version: version.parse()?,
            dependencies: parse_lines(dependencies)?,
            extras: BTreeMap::new(),
            failure: None,
        };
        self.direct.write().insert(direct_key(url)?, source);
        Ok(())
    }

    /// Add an optional dependency group to a direct source.
    pub fn add_direct_extra(&self, url: &str, extra: &str, dependencies: &[&str]) -> Result<()> {
        let extra = normalized_extra(extra)?;
        let dependencies = parse_lines(dependencies)?;
        let key = direct_key(url)?;
        let mut direct = self.direct.write();
        let source = direct
            .get_mut(&key)
            .ok_or_else(|| Error::repository(format!("unknown direct source {url}")))?;
        source.extras.insert(extra, dependencies);
        Ok(())
    }

    /// Make metadata discovery for a direct source fail with `message`.
    pub fn fail_direct_source(&self, url: &str, message: &str) -> Result<()> {
        let key = direct_key(url)?;
        let mut direct = self.direct.write();
        let source = direct
            .get_mut(&key)
            .ok_or_else(|| Error::repository(format!("unknown direct source {url}")))?;
        source.failure = Some(message.to_string());
        Ok(())
    }

    /// All known versions of a package, newest first.
    #[must_use]
    pub fn versions(&self, name: &PackageName) -> Vec<Version> {
        self.releases
            .read()
            .get(name)
            .map(|releases| releases.iter().map(|r| r.version.clone()).collect())
            .unwrap_or_default()
    }

    fn with_release(&self, name: &str, version: &str, f: impl FnOnce(&mut Release)) -> Result<()> {
        let name: PackageName = name.parse()?;
        let version: Version = version.parse()?;
        let mut releases = self.releases.write();
        let release = releases
            .get_mut(&name)
            .and_then(|list| list.iter_mut().find(|r| r.version == version))
            .ok_or_else(|| Error::repository(format!("unknown release {name}=={version}")))?;
        f(release);
        Ok(())
    }

    fn direct_source(&self, requirement: &Requirement) -> Option<DirectSource> {
        let key = requirement.source.identity()?;
        self.direct.read().get(&key).cloned()
    }

    fn pinned_release(&self, operation: &'static str, requirement: &Requirement) -> Result<Release> {
        let version = requirement
            .pinned_version()
            .ok_or_else(|| Error::not_pinned(operation, requirement))?;
        self.releases
            .read()
            .get(&requirement.name)
            .and_then(|list| list.iter().find(|r| &r.version == version))
            .cloned()
            .ok_or_else(|| {
                Error::repository(format!("unknown release {}=={version}", requirement.name))
            })
    }
}

impl Repository for MemoryRepository {
    fn find_best_candidate(
        &self,
        requirement: &Requirement,
        excluded: &BTreeSet<Version>,
    ) -> Result<Option<Candidate>> {
        if requirement.is_direct() {
            let Some(direct) = self.direct_source(requirement) else {
                debug!(requirement = %requirement, "unknown direct source");
                return Ok(None);
            };
            if direct.name != requirement.name {
                return Err(Error::dependency_resolution_failed(
                    requirement.source.url().unwrap_or_default(),
                    format!("source provides {} not {}", direct.name, requirement.name),
                ));
            }
            let usable =
                !excluded.contains(&direct.version) && requirement.specifier.contains(&direct.version);
            return Ok(usable.then(|| Candidate {
                name: direct.name,
                version: direct.version,
                source: requirement.source.clone(),
            }));
        }

        let releases = self.releases.read();
        let Some(list) = releases.get(&requirement.name) else {
            return Ok(None);
        };
        let available = list
            .iter()
            .filter(|release| release.is_available(&self.tags))
            .map(|release| &release.version);
        let chosen = select_version(
            requirement,
            available,
            excluded,
            self.options.allow_prereleases,
        );
        Ok(chosen.map(|version| Candidate::registry(requirement.name.clone(), version.clone())))
    }

    fn get_dependencies(&self, requirement: &Requirement) -> Result<Vec<Requirement>> {
        let (dependencies, extras) = if requirement.is_direct() {
            let url = requirement.source.url().unwrap_or_default();
            let direct = self.direct_source(requirement).ok_or_else(|| {
                Error::dependency_resolution_failed(url, "source is not available")
            })?;
            if let Some(message) = direct.failure {
                return Err(Error::dependency_resolution_failed(url, message));
            }
            (direct.dependencies, direct.extras)
        } else {
            let release = self.pinned_release("get_dependencies", requirement)?;
            (release.dependencies, release.extras)
        };

        let mut result = dependencies;
        for extra in &requirement.extras {
            match extras.get(extra) {
                Some(group) => result.extend(group.iter().cloned()),
                None => warn!(
                    package = %requirement.name,
                    extra = %extra,
                    "requested extra is not provided"
                ),
            }
        }
        Ok(result)
    }

    fn get_hashes(&self, requirement: &Requirement) -> Result<BTreeSet<String>> {
        if requirement.is_direct() {
            return Ok(BTreeSet::new());
        }
        let release = self.pinned_release("get_hashes", requirement)?;
        Ok(release
            .artifacts
            .iter()
            .filter(|artifact| self.tags.is_compatible(&artifact.filename))
            .map(|artifact| artifact.hash.clone())
            .collect())
    }
}

fn parse_lines(lines: &[&str]) -> Result<Vec<Requirement>> {
    lines.iter().map(|line| Requirement::parse(line)).collect()
}

fn normalized_extra(extra: &str) -> Result<String> {
    PackageName::parse(extra)
        .map(|name| name.as_str().to_string())
        .ok_or_else(|| Error::invalid_requirement(extra, "invalid extra name"))
}

/// Lookup key for a direct source URL written as in a requirement line.
fn direct_key(url: &str) -> Result<String> {
    let requirement = Requirement::parse(&format!("{url}#egg=placeholder"))
        .or_else(|_| Requirement::parse(url))?;
    match requirement.source {
        RequirementSource::Registry => Err(Error::invalid_requirement(url, "not a direct source")),
        source => source
            .identity()
            .ok_or_else(|| Error::invalid_requirement(url, "not a direct source")),
    }
}
