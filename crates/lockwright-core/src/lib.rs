//! Core types for Lockwright.
//!
//! This crate provides the vocabulary shared by the resolver and the
//! lockfile writer:
//!
//! - [`PackageName`]: normalized project names
//! - [`Version`]: PEP 440 versions with their total ordering
//! - [`VersionSpecifiers`]: clause sets with exact intersection
//! - [`Error`]: coded errors with suggestions

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
mod name;
mod specifier;
mod version;

pub use error::{Error, ErrorCode, Result};
pub use name::PackageName;
pub use specifier::{Clause, Operator, VersionSpecifiers};
pub use version::{LocalSegment, PrePhase, Version, clear_cache as clear_version_cache};

// Re-export commonly used types
pub use ahash::{AHashMap, AHashSet};
