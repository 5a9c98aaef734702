//! Testing utilities for Lockwright.
//!
//! This crate provides test helpers, fixtures, strategies and assertions
//! for testing the resolver and lockfile crates.
//!
//! # Modules
//!
//! - [`fixtures`]: Scenario repositories built from compact JSON indexes
//! - [`assertions`]: Domain-specific checks on resolved sets and lockfiles
//! - [`proptest_strategies`]: Proptest strategies for versions, specifiers
//!   and requirements
//! - [`temp_project`]: Temporary project directories with `requirements.in`
//!
//! # Example
//!
//! ```rust,no_run
//! use lockwright_test_utils::prelude::*;
//! use serde_json::json;
//!
//! let repo = Scenario::from_json(&json!({
//!     "foo": { "1.0": ["bar>=1.0,<2.0"] },
//!     "bar": { "1.5": [] },
//! }))
//! .unwrap()
//! .build();
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod assertions;
pub mod fixtures;
pub mod proptest_strategies;
pub mod temp_project;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test-friendly `tracing` subscriber once per process.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Output goes
/// through the test writer so it is captured per test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_test_writer()
            .try_init();
    });
}

/// Re-export commonly used testing utilities.
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::fixtures::{Fixtures, Scenario};
    pub use crate::init_tracing;
    pub use crate::temp_project::TempProject;

    // Re-export common testing crates
    pub use pretty_assertions::{assert_eq, assert_ne};
    pub use proptest::prelude::*;
}
