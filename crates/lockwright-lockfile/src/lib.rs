//! Requirements lockfile management.
//!
//! This crate turns a resolved set into a pip-compatible requirements file
//! and reads one back:
//!
//! - **Rendering**: header, index options, sorted entries with hashes and
//!   `# via` annotations
//! - **Previous pins**: parse an existing lockfile into upgrade preferences
//! - **Atomic operations**: crash-safe writes using temp file + rename under
//!   an exclusive lock
//!
//! # Example
//!
//! ```no_run
//! use lockwright_lockfile::{LockfileWriter, read_previous_pins_from};
//! use lockwright_resolver::{MemoryRepository, Requirement, ResolveRequest, Resolver, ResolverConfig};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = Arc::new(MemoryRepository::new());
//! repo.add_release("six", "1.16.0", &[])?;
//!
//! let previous = read_previous_pins_from("requirements.txt")?;
//! let request = ResolveRequest::new([Requirement::parse("six")?]).with_previous_pins(previous);
//! let resolved = Resolver::new(repo, ResolverConfig::from_env()).resolve(&request)?;
//!
//! LockfileWriter::new().write("requirements.txt", &resolved, None)?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod atomic;
pub mod error;
pub mod reader;
pub mod writer;

pub use atomic::{WriteResult, read_locked, write_atomic};
pub use error::{LockfileError, Result};
pub use reader::{read_previous_pins, read_previous_pins_from};
pub use writer::{DEFAULT_INDEX_URL, LockfileWriter, format_requirement, format_specifier};
