//! Memoizing repository decorator.
//!
//! [`CachingRepository`] wraps any [`Repository`], remembering dependency
//! and hash lookups in concurrent maps. Calls for the same package name are
//! serialized through a per-name lock so an expensive metadata build runs
//! once; different names proceed in parallel.

use crate::repository::{Candidate, Repository};
use crate::requirement::Requirement;
use dashmap::DashMap;
use lockwright_core::{PackageName, Result, Version};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Statistics for cache performance monitoring.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    /// Record a cache hit.
    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss.
    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of hits so far.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of misses so far.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get the cache hit rate.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Repository decorator caching dependencies and hashes.
pub struct CachingRepository<R> {
    inner: R,
    dependencies: DashMap<String, Vec<Requirement>, ahash::RandomState>,
    hashes: DashMap<String, BTreeSet<String>, ahash::RandomState>,
    locks: DashMap<PackageName, Arc<Mutex<()>>, ahash::RandomState>,
    /// Cache statistics.
    pub stats: CacheStats,
}

impl<R> std::fmt::Debug for CachingRepository<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingRepository")
            .field("cached_dependencies", &self.dependencies.len())
            .field("cached_hashes", &self.hashes.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<R: Repository> CachingRepository<R> {
    /// Wrap `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            dependencies: DashMap::with_hasher(ahash::RandomState::new()),
            hashes: DashMap::with_hasher(ahash::RandomState::new()),
            locks: DashMap::with_hasher(ahash::RandomState::new()),
            stats: CacheStats::default(),
        }
    }

    /// The wrapped repository.
    #[must_use]
    pub const fn inner(&self) -> &R {
        &self.inner
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.dependencies.clear();
        self.hashes.clear();
    }

    fn lock_for(&self, name: &PackageName) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(name.clone()).or_default().value())
    }

    /// Look up `key` in `cache`, computing and storing it under the
    /// package's lock on a miss.
    fn memoized<T: Clone>(
        &self,
        cache: &DashMap<String, T, ahash::RandomState>,
        requirement: &Requirement,
        compute: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let key = cache_key(requirement);
        if let Some(hit) = cache.get(&key) {
            self.stats.record_hit();
            trace!(requirement = %key, "cache hit");
            return Ok(hit.value().clone());
        }

        let lock = self.lock_for(&requirement.name);
        let _guard = lock.lock();

        // Another caller may have filled the entry while we waited.
        if let Some(hit) = cache.get(&key) {
            self.stats.record_hit();
            return Ok(hit.value().clone());
        }

        self.stats.record_miss();
        trace!(requirement = %key, "cache miss");
        let value = compute()?;
        cache.insert(key, value.clone());
        Ok(value)
    }
}

impl<R: Repository> Repository for CachingRepository<R> {
    fn find_best_candidate(
        &self,
        requirement: &Requirement,
        excluded: &BTreeSet<Version>,
    ) -> Result<Option<Candidate>> {
        let lock = self.lock_for(&requirement.name);
        let _guard = lock.lock();
        self.inner.find_best_candidate(requirement, excluded)
    }

    fn get_dependencies(&self, requirement: &Requirement) -> Result<Vec<Requirement>> {
        self.memoized(&self.dependencies, requirement, || {
            self.inner.get_dependencies(requirement)
        })
    }

    fn get_hashes(&self, requirement: &Requirement) -> Result<BTreeSet<String>> {
        self.memoized(&self.hashes, requirement, || self.inner.get_hashes(requirement))
    }
}

/// Requirements differing only in parents share cache entries.
fn cache_key(requirement: &Requirement) -> String {
    let mut key = requirement.without_parents().to_string();
    if let Some(version) = requirement.pinned_version()
        && requirement.is_direct()
    {
        key.push_str(&format!(" =={version}"));
    }
    key
}
