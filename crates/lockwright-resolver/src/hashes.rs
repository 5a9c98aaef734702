//! Artifact hash collection.
//!
//! Runs after resolution: every registry pin is asked for the hashes of its
//! compatible artifacts on a dedicated rayon pool. Direct sources have no
//! fixed artifact and get an empty set without a repository call.

use crate::conflict::ResolveError;
use crate::repository::Repository;
use crate::requirement::Requirement;
use crate::types::ResolvedSet;
use lockwright_core::{Error as CoreError, PackageName};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What to do when a hash lookup fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashFailurePolicy {
    /// The first failure aborts collection.
    #[default]
    FailFast,
    /// Failures are reported per package next to the successful hashes.
    Partial,
}

impl fmt::Display for HashFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => f.write_str("fail-fast"),
            Self::Partial => f.write_str("partial"),
        }
    }
}

impl FromStr for HashFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-fast" | "failfast" => Ok(Self::FailFast),
            "partial" => Ok(Self::Partial),
            other => Err(format!("unknown hash failure policy '{other}'")),
        }
    }
}

/// Hashes per pinned package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHashes(BTreeMap<PackageName, BTreeSet<String>>);

impl ArtifactHashes {
    /// Hashes of `name`.
    #[must_use]
    pub fn get(&self, name: &PackageName) -> Option<&BTreeSet<String>> {
        self.0.get(name)
    }

    /// Number of packages with an entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&PackageName, &BTreeSet<String>)> {
        self.0.iter()
    }

    /// Record hashes for a package.
    pub fn insert(&mut self, name: PackageName, hashes: BTreeSet<String>) {
        self.0.insert(name, hashes);
    }

    /// Take the underlying map.
    #[must_use]
    pub fn into_inner(self) -> BTreeMap<PackageName, BTreeSet<String>> {
        self.0
    }
}

impl FromIterator<(PackageName, BTreeSet<String>)> for ArtifactHashes {
    fn from_iter<I: IntoIterator<Item = (PackageName, BTreeSet<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Result of partial collection.
#[derive(Debug, Default)]
pub struct HashReport {
    /// Packages whose hashes were collected.
    pub hashes: ArtifactHashes,
    /// Packages whose lookup failed.
    pub failures: BTreeMap<PackageName, ResolveError>,
}

impl HashReport {
    /// Whether every lookup succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Collects artifact hashes for a resolved set.
#[derive(Debug)]
pub struct HashCollector<'a, R: Repository> {
    repository: &'a R,
    workers: usize,
}

impl<'a, R: Repository> HashCollector<'a, R> {
    /// Collector using `workers` threads.
    pub fn new(repository: &'a R, workers: usize) -> Self {
        Self {
            repository,
            workers: workers.max(1),
        }
    }

    /// Collect hashes; the first failure aborts.
    pub fn collect(&self, resolved: &ResolvedSet) -> Result<ArtifactHashes, ResolveError> {
        let start = Instant::now();
        let entries: Vec<(&PackageName, &Requirement)> = resolved.iter().collect();
        let hashes = self.run(|| {
            entries
                .par_iter()
                .map(|(name, requirement)| {
                    self.hashes_for(requirement)
                        .map(|hashes| ((*name).clone(), hashes))
                })
                .collect::<Result<Vec<_>, ResolveError>>()
        })?;

        info!(
            packages = hashes.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "hash collection complete"
        );
        Ok(hashes.into_iter().collect())
    }

    /// Collect hashes under `policy`. Fail-fast returns the first error;
    /// partial collection reports failures per package.
    pub fn collect_with_policy(
        &self,
        resolved: &ResolvedSet,
        policy: HashFailurePolicy,
    ) -> Result<HashReport, ResolveError> {
        match policy {
            HashFailurePolicy::FailFast => Ok(HashReport {
                hashes: self.collect(resolved)?,
                failures: BTreeMap::new(),
            }),
            HashFailurePolicy::Partial => Ok(self.collect_partial(resolved)),
        }
    }

    /// Collect hashes, reporting failures per package instead of aborting.
    pub fn collect_partial(&self, resolved: &ResolvedSet) -> HashReport {
        let entries: Vec<(&PackageName, &Requirement)> = resolved.iter().collect();
        let results = self.run(|| {
            entries
                .par_iter()
                .map(|(name, requirement)| ((*name).clone(), self.hashes_for(requirement)))
                .collect::<Vec<_>>()
        });

        let mut report = HashReport::default();
        for (name, result) in results {
            match result {
                Ok(hashes) => report.hashes.insert(name, hashes),
                Err(err) => {
                    warn!(package = %name, error = %err, "hash collection failed");
                    report.failures.insert(name, err);
                }
            }
        }
        info!(
            packages = report.hashes.len(),
            failures = report.failures.len(),
            "partial hash collection complete"
        );
        report
    }

    fn hashes_for(&self, requirement: &Requirement) -> Result<BTreeSet<String>, ResolveError> {
        if requirement.is_direct() {
            debug!(package = %requirement.name, "direct source, no hashes");
            return Ok(BTreeSet::new());
        }
        if requirement.pinned_version().is_none() {
            return Err(CoreError::not_pinned("collect_hashes", requirement).into());
        }
        Ok(self.repository.get_hashes(requirement)?)
    }

    fn run<T: Send>(&self, job: impl FnOnce() -> T + Send) -> T {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("lockwright-hash-{i}"))
            .build()
        {
            Ok(pool) => pool.install(job),
            Err(err) => {
                warn!(error = %err, "falling back to the global thread pool");
                job()
            }
        }
    }
}

/// Collect hashes for every pin with default workers, failing fast.
pub fn collect_hashes<R: Repository>(
    repository: &R,
    resolved: &ResolvedSet,
) -> Result<ArtifactHashes, ResolveError> {
    HashCollector::new(repository, num_cpus::get()).collect(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Artifact, MemoryRepository, sha256_hash};
    use crate::requirement::Parent;
    use lockwright_core::Version;

    fn name(s: &str) -> PackageName {
        s.parse().unwrap()
    }

    fn repo() -> MemoryRepository {
        let repo = MemoryRepository::new();
        repo.add_release("foo", "1.0", &[]).unwrap();
        repo.add_artifact("foo", "1.0", Artifact::from_bytes("foo-1.0.tar.gz", b"foo"))
            .unwrap();
        repo.add_release("bar", "2.0", &[]).unwrap();
        repo.add_artifact(
            "bar",
            "2.0",
            Artifact::from_bytes("bar-2.0-py3-none-any.whl", b"bar"),
        )
        .unwrap();
        repo
    }

    fn resolved(lines: &[&str]) -> ResolvedSet {
        let pins = lines
            .iter()
            .map(|line| {
                let req = Requirement::parse(line).unwrap().with_parent(Parent::Root);
                (req.name.clone(), req)
            })
            .collect();
        ResolvedSet::new(pins, std::iter::empty())
    }

    #[test]
    fn collects_registry_hashes() {
        let repo = repo();
        let set = resolved(&["foo==1.0", "bar==2.0"]);
        let hashes = HashCollector::new(&repo, 2).collect(&set).unwrap();
        assert_eq!(hashes.len(), 2);
        assert!(hashes.get(&name("foo")).unwrap().contains(&sha256_hash(b"foo")));
    }

    #[test]
    fn vcs_pins_get_empty_sets() {
        let repo = repo();
        let mut vcs = Requirement::parse("-e git+https://github.com/org/pkg@main#egg=pkg").unwrap();
        vcs.specifier = lockwright_core::VersionSpecifiers::exact(Version::parse("0.1").unwrap());
        let mut pins = BTreeMap::new();
        pins.insert(vcs.name.clone(), vcs);
        let set = ResolvedSet::new(pins, std::iter::empty());

        let hashes = collect_hashes(&repo, &set).unwrap();
        assert!(hashes.get(&name("pkg")).unwrap().is_empty());
    }

    #[test]
    fn fail_fast_aborts() {
        let repo = repo();
        let set = resolved(&["foo==1.0", "missing==1.0"]);
        let err = HashCollector::new(&repo, 2).collect(&set).unwrap_err();
        assert!(matches!(err, ResolveError::Repository { .. }));
    }

    #[test]
    fn partial_reports_failures() {
        let repo = repo();
        let set = resolved(&["foo==1.0", "missing==1.0"]);
        let report = HashCollector::new(&repo, 2).collect_partial(&set);
        assert!(!report.is_complete());
        assert_eq!(report.hashes.len(), 1);
        assert!(report.failures.contains_key(&name("missing")));
    }

    #[test]
    fn unpinned_entries_are_contract_violations() {
        let repo = repo();
        let set = resolved(&["foo>=1.0"]);
        let err = HashCollector::new(&repo, 1).collect(&set).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn policy_parsing() {
        assert_eq!("fail-fast".parse(), Ok(HashFailurePolicy::FailFast));
        assert_eq!("Partial".parse(), Ok(HashFailurePolicy::Partial));
        assert!("sometimes".parse::<HashFailurePolicy>().is_err());
        assert_eq!(HashFailurePolicy::Partial.to_string(), "partial");
    }
}
