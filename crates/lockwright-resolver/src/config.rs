//! Resolver configuration and environment overrides.

use crate::hashes::HashFailurePolicy;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variables read by [`ResolverConfig::from_env`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverEnvVar {
    /// `LOCKWRIGHT_MAX_ITERATIONS` - expansion step budget.
    MaxIterations,
    /// `LOCKWRIGHT_HASH_WORKERS` - hash collection threads.
    HashWorkers,
    /// `LOCKWRIGHT_HASH_POLICY` - `fail-fast` or `partial`.
    HashPolicy,
}

impl ResolverEnvVar {
    /// Get the environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MaxIterations => "LOCKWRIGHT_MAX_ITERATIONS",
            Self::HashWorkers => "LOCKWRIGHT_HASH_WORKERS",
            Self::HashPolicy => "LOCKWRIGHT_HASH_POLICY",
        }
    }

    /// Get the value if set.
    #[must_use]
    pub fn get(self) -> Option<String> {
        std::env::var(self.as_str()).ok()
    }

    /// Get as a positive integer.
    #[must_use]
    pub fn as_positive_usize(self) -> Option<usize> {
        let raw = self.get()?;
        match raw.trim().parse::<usize>() {
            Ok(value) if value > 0 => Some(value),
            _ => {
                warn!(variable = self.as_str(), value = %raw, "ignoring invalid value");
                None
            }
        }
    }
}

/// Resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResolverConfig {
    /// Maximum queue pops before giving up.
    pub max_iterations: usize,
    /// Threads used for hash collection.
    pub hash_workers: usize,
    /// What to do when a hash lookup fails.
    pub hash_failure_policy: HashFailurePolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            hash_workers: num_cpus::get().clamp(1, 16),
            hash_failure_policy: HashFailurePolicy::FailFast,
        }
    }
}

impl ResolverConfig {
    /// Defaults overlaid with `LOCKWRIGHT_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay environment variables onto this configuration. Invalid
    /// values are logged and ignored.
    pub fn apply_env(&mut self) {
        if let Some(value) = ResolverEnvVar::MaxIterations.as_positive_usize() {
            self.max_iterations = value;
        }
        if let Some(value) = ResolverEnvVar::HashWorkers.as_positive_usize() {
            self.hash_workers = value;
        }
        if let Some(raw) = ResolverEnvVar::HashPolicy.get() {
            match raw.parse() {
                Ok(policy) => self.hash_failure_policy = policy,
                Err(err) => warn!(
                    variable = ResolverEnvVar::HashPolicy.as_str(),
                    error = %err,
                    "ignoring invalid value"
                ),
            }
        }
    }

    /// Set the iteration budget.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the hash worker count.
    #[must_use]
    pub const fn with_hash_workers(mut self, workers: usize) -> Self {
        self.hash_workers = workers;
        self
    }

    /// Set the hash failure policy.
    #[must_use]
    pub const fn with_hash_failure_policy(mut self, policy: HashFailurePolicy) -> Self {
        self.hash_failure_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_names() {
        assert_eq!(
            ResolverEnvVar::MaxIterations.as_str(),
            "LOCKWRIGHT_MAX_ITERATIONS"
        );
        assert_eq!(ResolverEnvVar::HashWorkers.as_str(), "LOCKWRIGHT_HASH_WORKERS");
        assert_eq!(ResolverEnvVar::HashPolicy.as_str(), "LOCKWRIGHT_HASH_POLICY");
    }

    #[test]
    fn defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.max_iterations, 10_000);
        assert!(config.hash_workers >= 1);
        assert_eq!(config.hash_failure_policy, HashFailurePolicy::FailFast);
    }

    #[test]
    fn serde_uses_kebab_case_and_defaults() {
        let config: ResolverConfig =
            serde_json::from_str(r#"{"max-iterations": 50, "hash-failure-policy": "partial"}"#)
                .unwrap();
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.hash_failure_policy, HashFailurePolicy::Partial);
        assert_eq!(config.hash_workers, ResolverConfig::default().hash_workers);
    }

    #[test]
    fn builders() {
        let config = ResolverConfig::default()
            .with_max_iterations(3)
            .with_hash_workers(2)
            .with_hash_failure_policy(HashFailurePolicy::Partial);
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.hash_workers, 2);
        assert_eq!(config.hash_failure_policy, HashFailurePolicy::Partial);
    }
}
