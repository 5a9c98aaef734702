//! Dependency resolution for Python requirement sets.
//!
//! This crate turns abstract requirements into a pinned, reproducible set:
//!
//! - **Requirement model**: parsing, merging and pinning of
//!   [`Requirement`]s with registry, VCS and local sources
//! - **Repository adapters**: the [`Repository`] trait, an in-memory index
//!   and a memoizing decorator
//! - **Fixed-point engine**: breadth-first expansion with pin replacement,
//!   selective upgrades and pruning
//! - **Hash collection**: parallel artifact hash lookup with an explicit
//!   failure policy
//! - **Conflict reports**: every demand on a conflicting package with the
//!   chain of packages that introduced it
//!
//! # Example
//!
//! ```
//! use lockwright_resolver::{MemoryRepository, Requirement, collect_hashes, resolve};
//! use std::collections::{BTreeMap, BTreeSet};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = MemoryRepository::new();
//! repo.add_release("flask", "2.0.1", &["click>=7.1.2"])?;
//! repo.add_release("click", "8.0.1", &[])?;
//!
//! let top = vec![Requirement::parse("flask")?];
//! let resolved = resolve(&repo, &top, &[], &BTreeMap::new(), &BTreeSet::new())?;
//! let hashes = collect_hashes(&repo, &resolved)?;
//!
//! assert_eq!(resolved.len(), 2);
//! assert_eq!(hashes.len(), 2);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod caching;
pub mod config;
pub mod conflict;
pub mod hashes;
mod memory;
pub mod repository;
pub mod requirement;
pub mod resolver;
pub mod tags;
pub mod types;

pub use caching::{CacheStats, CachingRepository};
pub use config::{ResolverConfig, ResolverEnvVar};
pub use conflict::{Demand, ResolveError, parent_chain};
pub use hashes::{ArtifactHashes, HashCollector, HashFailurePolicy, HashReport, collect_hashes};
pub use memory::{Artifact, MemoryRepository, Release, sha256_hash};
pub use repository::{Candidate, IndexOptions, Repository, select_version};
pub use requirement::{Parent, Requirement, RequirementSource, display_specifier, normalize_url};
pub use resolver::{Resolver, ResolverState, ResolverStats, resolve};
pub use tags::{ArtifactKind, Tag, TargetTags, wheel_tags};
pub use types::{ResolveRequest, ResolvedSet};

// Re-export the core vocabulary
pub use lockwright_core::{Error as CoreError, PackageName, Version, VersionSpecifiers};
