//! Proptest strategies for Lockwright types.
//!
//! This module provides strategies for generating random instances
//! of Lockwright domain types for property-based testing.

use anyhow::{Context, Result};
use lockwright_core::{Version, VersionSpecifiers};
use lockwright_resolver::{MemoryRepository, Requirement};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for generating project names, including separators that
/// normalize away.
pub fn package_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9]{0,8}([-_.][a-zA-Z0-9]{1,6}){0,2}"
}

/// Strategy for generating release segments such as `1.4.2`.
pub fn release_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(0u64..20, 1..=3).prop_map(|parts| {
        parts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    })
}

/// Strategy for generating final release versions.
pub fn final_version_strategy() -> impl Strategy<Value = String> {
    release_strategy()
}

/// Strategy for generating versions with PEP 440 suffixes.
pub fn version_strategy() -> impl Strategy<Value = String> {
    let suffix = prop_oneof![
        4 => Just(String::new()),
        1 => (prop_oneof![Just("a"), Just("b"), Just("rc")], 0u64..5)
            .prop_map(|(phase, n)| format!("{phase}{n}")),
        1 => (0u64..5).prop_map(|n| format!(".post{n}")),
        1 => (0u64..5).prop_map(|n| format!(".dev{n}")),
    ];
    let epoch = prop_oneof![8 => Just(String::new()), 1 => Just("1!".to_string())];
    (epoch, release_strategy(), suffix).prop_map(|(e, r, s)| format!("{e}{r}{s}"))
}

/// Strategy for generating parsed versions.
pub fn parsed_version_strategy() -> impl Strategy<Value = Version> {
    version_strategy().prop_filter_map("valid version", |v| Version::parse(&v))
}

/// Strategy for generating a single specifier clause.
pub fn clause_strategy() -> impl Strategy<Value = String> {
    let operator = prop_oneof![
        Just("=="),
        Just("!="),
        Just(">="),
        Just("<="),
        Just(">"),
        Just("<"),
    ];
    prop_oneof![
        6 => (operator, final_version_strategy()).prop_map(|(op, v)| format!("{op}{v}")),
        1 => (0u64..10, 0u64..10).prop_map(|(major, minor)| format!("~={major}.{minor}")),
        1 => (0u64..10).prop_map(|major| format!("=={major}.*")),
    ]
}

/// Strategy for generating comma-separated specifiers (possibly empty).
pub fn specifier_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(clause_strategy(), 0..=3).prop_map(|clauses| clauses.join(","))
}

/// Strategy for generating parsed specifiers.
pub fn parsed_specifier_strategy() -> impl Strategy<Value = VersionSpecifiers> {
    specifier_strategy().prop_filter_map("valid specifier", |s| VersionSpecifiers::parse(&s).ok())
}

/// Strategy for generating extras lists.
pub fn extras_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,6}", 0..=2)
}

/// Strategy for generating registry requirement lines for `name`.
pub fn requirement_line_strategy(name: &'static str) -> impl Strategy<Value = String> {
    (extras_strategy(), specifier_strategy()).prop_map(move |(extras, spec)| {
        if extras.is_empty() {
            format!("{name}{spec}")
        } else {
            format!("{name}[{}]{spec}", extras.join(","))
        }
    })
}

/// Strategy for generating parsed registry requirements for `name`.
pub fn requirement_strategy(name: &'static str) -> impl Strategy<Value = Requirement> {
    requirement_line_strategy(name).prop_filter_map("valid requirement", |line| {
        Requirement::parse(&line).ok()
    })
}

/// Strategy for generating arbitrary requirement-looking lines, valid or
/// not, for parser robustness tests.
pub fn noisy_line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => requirement_line_strategy("pkg"),
        1 => "-e (git\\+https|file)://[a-z./]{1,20}(@[a-z0-9]{1,6})?#egg=[a-z]{1,8}",
        1 => "[ -~]{0,40}",
    ]
}

/// Specifiers that all admit `1.0`, so any mix of them stays satisfiable.
const SATISFIABLE_AT_ONE: &[&str] = &[
    "",
    "<2",
    "<3",
    "<=1.0",
    "==1.0",
    "!=2.0",
    "!=3.0",
    ">=1.0,<3",
];

/// A small registry whose packages only depend on packages with a higher
/// index, plus the top-level lines to resolve against it.
///
/// Every package has `1.0` and every specifier admits it, so the inputs
/// never truly conflict. Higher releases declare different dependencies and
/// tighter specifiers, which forces pin replacement and leaves branches
/// behind.
#[derive(Debug, Clone)]
pub struct LayeredGraph {
    /// `(name, version, dependency lines)` per release.
    pub releases: Vec<(String, String, Vec<String>)>,
    /// Top-level requirement lines.
    pub top_level: Vec<String>,
}

impl LayeredGraph {
    /// Build the registry.
    pub fn repository(&self) -> Result<MemoryRepository> {
        let repo = MemoryRepository::new();
        for (name, version, dependencies) in &self.releases {
            let dependencies: Vec<&str> = dependencies.iter().map(String::as_str).collect();
            repo.add_release(name, version, &dependencies)
                .with_context(|| format!("adding {name}=={version}"))?;
        }
        Ok(repo)
    }

    /// Parsed top-level requirements.
    pub fn requirements(&self) -> Result<Vec<Requirement>> {
        self.top_level
            .iter()
            .map(|line| Requirement::parse(line).with_context(|| format!("parsing {line}")))
            .collect()
    }
}

/// Strategy for conflict-free layered registries of up to `max_packages`
/// packages with one to three releases each.
pub fn layered_graph_strategy(max_packages: usize) -> impl Strategy<Value = LayeredGraph> {
    let specifier = 0..SATISFIABLE_AT_ONE.len();
    let dependencies = prop::collection::vec((any::<usize>(), specifier.clone()), 0..3);
    let package = (1usize..=3, prop::collection::vec(dependencies, 3));
    (2..=max_packages.max(2)).prop_flat_map(move |count| {
        (
            prop::collection::vec(package.clone(), count),
            prop::collection::vec((0..count, specifier.clone()), 1..=3),
        )
            .prop_map(move |(packages, roots)| {
                let mut releases = Vec::new();
                for (index, (release_count, per_release)) in packages.into_iter().enumerate() {
                    let span = count - index - 1;
                    for (release, picks) in per_release.into_iter().take(release_count).enumerate() {
                        // One line per target, so a release never repeats a name.
                        let mut targets: BTreeMap<usize, &str> = BTreeMap::new();
                        if span > 0 {
                            for (target, spec) in picks {
                                targets.insert(index + 1 + target % span, SATISFIABLE_AT_ONE[spec]);
                            }
                        }
                        releases.push((
                            format!("p{index}"),
                            format!("{}.0", release + 1),
                            targets
                                .into_iter()
                                .map(|(target, spec)| format!("p{target}{spec}"))
                                .collect(),
                        ));
                    }
                }
                let top_level = roots
                    .into_iter()
                    .map(|(index, spec)| format!("p{index}{}", SATISFIABLE_AT_ONE[spec]))
                    .collect();
                LayeredGraph {
                    releases,
                    top_level,
                }
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_versions_parse(version in version_strategy()) {
            prop_assert!(Version::parse(&version).is_some(), "{version}");
        }

        #[test]
        fn generated_names_parse(name in package_name_strategy()) {
            prop_assert!(name.parse::<lockwright_core::PackageName>().is_ok());
        }

        #[test]
        fn generated_specifiers_parse(spec in specifier_strategy()) {
            prop_assert!(VersionSpecifiers::parse(&spec).is_ok(), "{spec}");
        }

        #[test]
        fn layered_graphs_only_point_downwards(graph in layered_graph_strategy(6)) {
            for (name, _, dependencies) in &graph.releases {
                let index: usize = name[1..].parse().unwrap();
                for line in dependencies {
                    let target = Requirement::parse(line).unwrap();
                    let target: usize = target.name.as_str()[1..].parse().unwrap();
                    prop_assert!(target > index, "{name} -> {line}");
                }
            }
            prop_assert!(!graph.requirements().unwrap().is_empty());
            prop_assert!(graph.repository().is_ok());
        }
    }
}
