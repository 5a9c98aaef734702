//! Resolution errors and conflict diagnostics.
//!
//! Every resolution-fatal error carries enough context to explain itself:
//! the demands on a conflicting package, each with the chain of packages
//! that led from a top-level input to it.

// False positive warnings from thiserror macro expansion
#![allow(unused_assignments)]

use crate::requirement::Parent;
use lockwright_core::{Error as CoreError, PackageName};
use miette::Diagnostic;
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// One demand on a package: the specifier asked for and how it was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demand {
    /// Specifier as written (`<any>` when unconstrained).
    pub specifier: String,
    /// Packages from a top-level input down to the declaring package.
    pub parent_chain: Vec<PackageName>,
}

impl Demand {
    /// Create a demand.
    #[must_use]
    pub fn new(specifier: impl Into<String>, parent_chain: Vec<PackageName>) -> Self {
        Self {
            specifier: specifier.into(),
            parent_chain,
        }
    }
}

impl fmt::Display for Demand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (from {})", self.specifier, render_chain(&self.parent_chain))
    }
}

fn render_chain(chain: &[PackageName]) -> String {
    let names: Vec<&str> = chain.iter().map(PackageName::as_str).collect();
    names.join(" -> ")
}

fn render_demands(name: &PackageName, demands: &[Demand]) -> String {
    let mut output = String::new();
    for demand in demands {
        let declarer = match demand.parent_chain.as_slice() {
            [only] if only == name => "top-level input",
            [.., last] => last.as_str(),
            [] => "top-level input",
        };
        output.push_str(&format!(
            "\n  {declarer} requires {name}{} (via {})",
            demand.specifier.replace("<any>", ""),
            render_chain(&demand.parent_chain)
        ));
    }
    output
}

/// Errors that abort a resolution run.
#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    /// Top-level inputs contradict each other.
    #[error("incompatible input requirements: {source}")]
    #[diagnostic(
        code(resolve::incompatible_constraints),
        help("adjust the top-level requirements or constraints so they overlap")
    )]
    IncompatibleConstraints {
        /// The failed merge.
        source: CoreError,
    },

    /// No version satisfies every demand on a package.
    #[error("could not find a version of {name} that satisfies all demands:{}", render_demands(.name, .demands))]
    #[diagnostic(
        code(resolve::version_conflict),
        help("relax one of the listed specifiers or pin a compatible parent version")
    )]
    VersionConflict {
        /// Conflicting package.
        name: PackageName,
        /// Every active demand in the order it was made.
        demands: Vec<Demand>,
    },

    /// No candidate exists for a requirement at all.
    #[error("no candidate found for {requirement} (required via {})", render_chain(.parent_chain))]
    #[diagnostic(
        code(resolve::unresolvable),
        help("check the package name and index configuration")
    )]
    UnresolvableRequirement {
        /// The requirement as written.
        requirement: String,
        /// Packages from a top-level input down to the declaring package.
        parent_chain: Vec<PackageName>,
    },

    /// Metadata discovery failed; the message is kept verbatim.
    #[error("Dependency resolution of {source_id} failed:\n{message}")]
    #[diagnostic(code(resolve::dependency_resolution_failed))]
    DependencyResolutionFailed {
        /// Source identifier (URL or `name==version`).
        source_id: String,
        /// Underlying diagnostic text.
        message: String,
    },

    /// Resolution did not converge within the configured step budget.
    #[error("resolution did not converge after {iterations} steps")]
    #[diagnostic(
        code(resolve::iteration_limit),
        help("raise LOCKWRIGHT_MAX_ITERATIONS or look for oscillating pins")
    )]
    IterationLimit {
        /// Steps taken.
        iterations: usize,
    },

    /// The repository failed for a reason other than metadata discovery.
    #[error("repository error: {source}")]
    #[diagnostic(code(resolve::repository))]
    Repository {
        /// Underlying error.
        source: CoreError,
    },

    /// A caller or adapter broke an API contract.
    #[error("contract violation: {source}")]
    #[diagnostic(code(resolve::contract))]
    Contract {
        /// Underlying error.
        source: CoreError,
    },
}

impl From<CoreError> for ResolveError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DependencyResolutionFailed { source_id, message } => {
                Self::DependencyResolutionFailed { source_id, message }
            }
            err if err.is_contract_violation() => Self::Contract { source: err },
            err => Self::Repository { source: err },
        }
    }
}

impl ResolveError {
    /// The conflicting package, for conflict errors.
    #[must_use]
    pub const fn conflicting_name(&self) -> Option<&PackageName> {
        match self {
            Self::VersionConflict { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Whether this error is a caller contract violation.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(self, Self::Contract { .. })
    }
}

/// Shortest chain from a top-level input down to the declarer of a demand.
///
/// `origin` is the demanded package and `parents` the demand's parents. A
/// top-level demand's chain is `[origin]`. Otherwise the search walks
/// `parents_of` back-references breadth-first, in sorted order, until it
/// reaches a package with a `Root` parent; visited names are skipped so
/// cycles terminate.
pub fn parent_chain<F>(
    origin: &PackageName,
    parents: &BTreeSet<Parent>,
    parents_of: F,
) -> Vec<PackageName>
where
    F: Fn(&PackageName) -> BTreeSet<Parent>,
{
    if parents.contains(&Parent::Root) || parents.is_empty() {
        return vec![origin.clone()];
    }

    let starts: Vec<&PackageName> = parents
        .iter()
        .filter_map(|parent| match parent {
            Parent::Package(name) => Some(name),
            Parent::Root => None,
        })
        .collect();

    // Each queued entry carries the path from the declarer upwards.
    let mut visited: BTreeSet<PackageName> = BTreeSet::new();
    let mut queue: VecDeque<Vec<PackageName>> = VecDeque::new();
    for start in &starts {
        if visited.insert((*start).clone()) {
            queue.push_back(vec![(*start).clone()]);
        }
    }

    while let Some(path) = queue.pop_front() {
        let Some(current) = path.last() else {
            continue;
        };
        let upstream = parents_of(current);
        if upstream.contains(&Parent::Root) {
            let mut chain = path;
            chain.reverse();
            return chain;
        }
        for parent in &upstream {
            if let Parent::Package(name) = parent
                && visited.insert(name.clone())
            {
                let mut next = path.clone();
                next.push(name.clone());
                queue.push_back(next);
            }
        }
    }

    debug!(package = %origin, ?starts, "no parent chain reaches an input");
    starts
        .first()
        .map_or_else(|| vec![origin.clone()], |name| vec![(*name).clone()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap;
    use pretty_assertions::assert_eq;

    fn name(s: &str) -> PackageName {
        s.parse().unwrap()
    }

    fn graph(edges: &[(&str, &str)], roots: &[&str]) -> AHashMap<PackageName, BTreeSet<Parent>> {
        let mut parents: AHashMap<PackageName, BTreeSet<Parent>> = AHashMap::new();
        for root in roots {
            parents.entry(name(root)).or_default().insert(Parent::Root);
        }
        for (parent, child) in edges {
            parents
                .entry(name(child))
                .or_default()
                .insert(Parent::Package(name(parent)));
        }
        parents
    }

    fn chain(
        graph: &AHashMap<PackageName, BTreeSet<Parent>>,
        origin: &str,
        declarer: &str,
    ) -> Vec<String> {
        let parents = BTreeSet::from([Parent::Package(name(declarer))]);
        parent_chain(&name(origin), &parents, |n| {
            graph.get(n).cloned().unwrap_or_default()
        })
        .into_iter()
        .map(|n| n.to_string())
        .collect()
    }

    #[test]
    fn top_level_demand_is_its_own_chain() {
        let chain = parent_chain(&name("bar"), &BTreeSet::from([Parent::Root]), |_| {
            BTreeSet::new()
        });
        assert_eq!(chain, vec![name("bar")]);
    }

    #[test]
    fn direct_dependency_chain() {
        let g = graph(&[("foo", "bar")], &["foo"]);
        assert_eq!(chain(&g, "bar", "foo"), vec!["foo"]);
    }

    #[test]
    fn transitive_chain_runs_from_input_down() {
        let g = graph(&[("app", "web"), ("web", "http"), ("http", "idna")], &["app"]);
        assert_eq!(chain(&g, "idna", "http"), vec!["app", "web", "http"]);
    }

    #[test]
    fn shortest_path_wins() {
        let g = graph(
            &[("app", "a"), ("a", "b"), ("b", "lib"), ("app", "lib")],
            &["app"],
        );
        assert_eq!(chain(&g, "x", "lib"), vec!["app", "lib"]);
    }

    #[test]
    fn cycles_terminate() {
        let g = graph(&[("a", "b"), ("b", "a")], &[]);
        assert_eq!(chain(&g, "c", "a"), vec!["a"]);
    }

    #[test]
    fn version_conflict_rendering() {
        let err = ResolveError::VersionConflict {
            name: name("bar"),
            demands: vec![
                Demand::new("==1.0", vec![name("bar")]),
                Demand::new("==2.0", vec![name("foo")]),
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("top-level input requires bar==1.0"));
        assert!(rendered.contains("foo requires bar==2.0"));
    }

    #[test]
    fn core_errors_map_by_kind() {
        let err: ResolveError =
            CoreError::dependency_resolution_failed("file:///pkg", "boom").into();
        assert!(matches!(err, ResolveError::DependencyResolutionFailed { .. }));
        assert!(err.to_string().ends_with("boom"));

        let err: ResolveError = CoreError::not_pinned("get_hashes", "foo").into();
        assert!(err.is_contract_violation());

        let err: ResolveError = CoreError::repository("timeout").into();
        assert!(matches!(err, ResolveError::Repository { .. }));
    }
}
