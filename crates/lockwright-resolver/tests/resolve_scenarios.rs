//! End-to-end resolution scenarios over in-memory repositories.

use lockwright_resolver::{
    CachingRepository, HashCollector, HashFailurePolicy, Repository, ResolveError, ResolveRequest,
    Resolver, ResolverConfig, Requirement, resolve,
};
use lockwright_test_utils::prelude::*;
use lockwright_test_utils::prelude::assert_eq;
use lockwright_test_utils::fixtures::Scenario;
use lockwright_test_utils::proptest_strategies::{
    layered_graph_strategy, parsed_version_strategy, requirement_strategy,
};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

fn reqs(lines: &[&str]) -> Vec<Requirement> {
    lines
        .iter()
        .map(|line| Requirement::parse(line).unwrap())
        .collect()
}

fn run<R: lockwright_resolver::Repository>(
    repo: &R,
    top: &[&str],
) -> Result<lockwright_resolver::ResolvedSet, ResolveError> {
    resolve(repo, &reqs(top), &[], &BTreeMap::new(), &BTreeSet::new())
}

#[test]
fn resolves_highest_compatible_version() {
    init_tracing();
    let repo = Fixtures::foo_bar().unwrap();
    let resolved = run(&repo, &["foo"]).unwrap();
    assert_pins(&resolved, &["foo==1.0", "bar==1.5"]).unwrap();
    assert_closed(&resolved).unwrap();
}

#[test]
fn conflict_reports_every_demand() {
    init_tracing();
    let repo = Fixtures::bar_conflict().unwrap();
    let err = run(&repo, &["foo==1.0", "bar==1.0"]).unwrap_err();
    assert_conflict(
        &err,
        "bar",
        &[("==1.0", &["bar"][..]), ("==2.0", &["foo"][..])],
    )
    .unwrap();
    assert!(err.to_string().contains("bar"));
}

#[test]
fn resolving_the_result_again_is_stable() {
    let repo = Fixtures::flask_stack().unwrap();
    let top = reqs(&["flask[dotenv]"]);
    let first = resolve(&repo, &top, &[], &BTreeMap::new(), &BTreeSet::new()).unwrap();
    assert_demands_satisfied(&first, &top).unwrap();

    let second = resolve(
        &repo,
        &first.as_input(),
        &[],
        &BTreeMap::new(),
        &BTreeSet::new(),
    )
    .unwrap();
    assert_eq!(first, second);
}

#[test]
fn previous_pins_are_kept_unless_upgraded() {
    let repo = Fixtures::upgradable().unwrap();
    let previous: BTreeMap<_, _> = [("a", "1.0"), ("b", "1.0")]
        .into_iter()
        .map(|(name, version)| (name.parse().unwrap(), version.parse().unwrap()))
        .collect();
    let upgrade: BTreeSet<_> = ["b".parse().unwrap()].into_iter().collect();

    let resolved = resolve(&repo, &reqs(&["a", "b"]), &[], &previous, &upgrade).unwrap();
    assert_pins(&resolved, &["a==1.0", "b==2.0"]).unwrap();

    let request = ResolveRequest::new(reqs(&["a", "b"]))
        .with_previous_pins(previous)
        .with_upgrade_all();
    let resolver = Resolver::new(Arc::new(repo), ResolverConfig::default());
    let resolved = resolver.resolve(&request).unwrap();
    assert_pins(&resolved, &["a==2.0", "b==2.0"]).unwrap();
}

#[test]
fn previous_pin_outside_the_specifier_is_ignored() {
    let repo = Fixtures::upgradable().unwrap();
    let previous: BTreeMap<_, _> = [("a".parse().unwrap(), "1.0".parse().unwrap())]
        .into_iter()
        .collect();
    let resolved = resolve(&repo, &reqs(&["a>1.0"]), &[], &previous, &BTreeSet::new()).unwrap();
    assert_pinned(&resolved, "a", "2.0").unwrap();
}

#[test]
fn constraints_only_apply_to_pulled_in_packages() {
    let repo = Fixtures::foo_bar().unwrap();
    let constraints = reqs(&["bar<1.5", "unrelated==9.9"]);
    let resolved = resolve(
        &repo,
        &reqs(&["foo"]),
        &constraints,
        &BTreeMap::new(),
        &BTreeSet::new(),
    )
    .unwrap();
    assert_pins(&resolved, &["foo==1.0", "bar==1.0"]).unwrap();
    assert_not_pinned(&resolved, "unrelated").unwrap();
}

#[test]
fn contradicting_constraint_is_rejected_up_front() {
    let repo = Fixtures::foo_bar().unwrap();
    let err = resolve(
        &repo,
        &reqs(&["bar>=2.0"]),
        &reqs(&["bar<1.5"]),
        &BTreeMap::new(),
        &BTreeSet::new(),
    )
    .unwrap_err();
    assert!(matches!(err, ResolveError::IncompatibleConstraints { .. }));
}

#[test]
fn replaced_pin_drops_what_only_it_pulled_in() {
    init_tracing();
    let repo = Scenario::from_json(&json!({
        "x": { "1.0": [], "2.0": ["y"] },
        "w": { "1.0": ["x<2", "z>=2"] },
        "y": { "1.0": ["z<2"] },
        "z": { "1.0": [], "2.0": [] },
    }))
    .unwrap()
    .build();

    let resolved = run(&repo, &["x", "w"]).unwrap();
    assert_pins(&resolved, &["w==1.0", "x==1.0", "z==2.0"]).unwrap();
    assert_not_pinned(&resolved, "y").unwrap();
    assert_closed(&resolved).unwrap();
}

#[test]
fn editable_demand_from_a_dependency_sticks() {
    let repo = Scenario::from_json(&json!({
        "app": { "1.0": ["-e git+https://h/org/foo#egg=foo"] },
        "@direct": {
            "git+https://h/org/foo": { "name": "foo", "version": "1.0" },
        },
    }))
    .unwrap()
    .build();

    let resolved = run(&repo, &["git+https://h/org/foo#egg=foo", "app"]).unwrap();
    let foo = resolved.get_str("foo").unwrap();
    assert!(foo.editable);
    assert!(foo.to_string().starts_with("-e "));
}

#[test]
fn vcs_checkout_has_no_hashes() {
    let repo = Fixtures::vcs_checkout().unwrap();
    let resolved = run(&repo, &["-e git+https://github.com/org/zed@main#egg=zed"]).unwrap();
    let zed = resolved.get_str("zed").unwrap();
    assert!(zed.editable);
    assert!(zed.is_direct());
    assert_pinned(&resolved, "six", "1.16.0").unwrap();

    let hashes = HashCollector::new(&repo, 2).collect(&resolved).unwrap();
    assert!(hashes.get(&"zed".parse().unwrap()).unwrap().is_empty());
    assert_eq!(hashes.get(&"six".parse().unwrap()).unwrap().len(), 1);
}

#[test]
fn failed_metadata_discovery_keeps_the_message() {
    let repo = Scenario::from_json(&json!({
        "@direct": {
            "file:///src/broken": {
                "name": "broken",
                "fail": "setup.py egg_info exited with status 1",
            },
        },
    }))
    .unwrap()
    .build();

    let err = run(&repo, &["file:///src/broken#egg=broken"]).unwrap_err();
    let ResolveError::DependencyResolutionFailed { source_id, message } = &err else {
        panic!("expected a dependency resolution failure, got {err}");
    };
    assert_eq!(source_id, "file:///src/broken");
    assert_eq!(message, "setup.py egg_info exited with status 1");
    assert!(
        err.to_string()
            .ends_with("failed:\nsetup.py egg_info exited with status 1")
    );
}

#[test]
fn missing_hashes_fail_fast_or_partially() {
    let repo = Fixtures::foo_bar().unwrap();
    let resolved = run(&repo, &["foo"]).unwrap();

    // Pins from elsewhere that the repository does not know about.
    let stray = resolve(
        &Fixtures::upgradable().unwrap(),
        &reqs(&["a"]),
        &[],
        &BTreeMap::new(),
        &BTreeSet::new(),
    )
    .unwrap();
    let mut pins: BTreeMap<_, _> = resolved
        .iter()
        .map(|(name, pin)| (name.clone(), pin.clone()))
        .collect();
    pins.extend(stray.iter().map(|(name, pin)| (name.clone(), pin.clone())));
    let combined = lockwright_resolver::ResolvedSet::new(pins, std::iter::empty());

    let collector = HashCollector::new(&repo, 2);
    assert!(collector.collect(&combined).is_err());

    let report = collector
        .collect_with_policy(&combined, HashFailurePolicy::Partial)
        .unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.hashes.len(), 2);
    assert!(report.failures.contains_key(&"a".parse().unwrap()));
}

#[test]
fn resolver_collects_hashes_with_configured_policy() {
    let repo = Arc::new(Fixtures::flask_stack().unwrap());
    let config = ResolverConfig::default()
        .with_hash_workers(2)
        .with_hash_failure_policy(HashFailurePolicy::Partial);
    let resolver = Resolver::new(repo, config);
    let resolved = resolver
        .resolve(&ResolveRequest::new(reqs(&["flask"])))
        .unwrap();
    let report = resolver.collect_hashes(&resolved).unwrap();
    assert!(report.is_complete());
    // The default target only accepts pure-python wheels and sdists.
    let markupsafe = report.hashes.get(&"markupsafe".parse().unwrap()).unwrap();
    assert_eq!(markupsafe.len(), 1);
}

#[test]
fn caching_repository_serves_repeat_lookups() {
    let repo = CachingRepository::new(Fixtures::flask_stack().unwrap());
    let first = run(&repo, &["flask"]).unwrap();
    let misses = repo.stats.misses();
    let second = run(&repo, &["flask"]).unwrap();
    assert_eq!(first, second);
    assert_eq!(repo.stats.misses(), misses);
    assert!(repo.stats.hits() > 0);
}

#[test]
fn cycles_resolve_once() {
    let repo = Fixtures::cycle().unwrap();
    let resolved = run(&repo, &["a"]).unwrap();
    assert_pins(&resolved, &["a==1.0", "b==1.0"]).unwrap();
    assert_closed(&resolved).unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn conflict_free_graphs_converge(graph in layered_graph_strategy(7)) {
        let repo = graph.repository().unwrap();
        let top = graph.requirements().unwrap();
        let resolved = resolve(&repo, &top, &[], &BTreeMap::new(), &BTreeSet::new());
        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(err) => return Err(TestCaseError::fail(format!("{err} for {graph:?}"))),
        };
        prop_assert!(assert_demands_satisfied(&resolved, &top).is_ok());
        prop_assert!(assert_closed(&resolved).is_ok());

        // Every dependency the final pins declare is met by exactly one pin.
        for (_, pin) in resolved.iter() {
            for dependency in repo.get_dependencies(pin).unwrap() {
                let target = resolved.get(&dependency.name);
                prop_assert!(
                    target.is_some_and(|target| dependency.is_satisfied_by(target)),
                    "{pin} needs {dependency} in {graph:?}"
                );
            }
        }
    }

    #[test]
    fn merge_is_commutative(
        left in requirement_strategy("pkg"),
        right in requirement_strategy("pkg"),
    ) {
        match (left.merge(&right), right.merge(&left)) {
            (Ok(ab), Ok(ba)) => {
                prop_assert_eq!(&ab.extras, &ba.extras);
                for version in ["0.1", "1.0", "1.5", "2.0", "10.3.1"] {
                    let version = version.parse().unwrap();
                    prop_assert_eq!(
                        ab.specifier.contains(&version),
                        ba.specifier.contains(&version)
                    );
                }
            }
            (Err(_), Err(_)) => {}
            (ab, ba) => prop_assert!(false, "merge order changed the outcome: {ab:?} vs {ba:?}"),
        }
    }

    #[test]
    fn merge_accepts_only_common_versions(
        left in requirement_strategy("pkg"),
        right in requirement_strategy("pkg"),
        version in parsed_version_strategy(),
    ) {
        let both = left.specifier.contains(&version) && right.specifier.contains(&version);
        match left.merge(&right) {
            Ok(merged) => prop_assert_eq!(merged.specifier.contains(&version), both),
            Err(_) => prop_assert!(!both),
        }
    }

    #[test]
    fn merge_is_associative(
        a in requirement_strategy("pkg"),
        b in requirement_strategy("pkg"),
        c in requirement_strategy("pkg"),
        version in parsed_version_strategy(),
    ) {
        let left = a.merge(&b).and_then(|ab| ab.merge(&c));
        let right = b.merge(&c).and_then(|bc| a.merge(&bc));
        match (left, right) {
            (Ok(left), Ok(right)) => {
                prop_assert_eq!(&left.extras, &right.extras);
                prop_assert_eq!(
                    left.specifier.contains(&version),
                    right.specifier.contains(&version)
                );
            }
            (Err(_), Err(_)) => {}
            (left, right) => prop_assert!(false, "grouping changed the outcome: {left:?} vs {right:?}"),
        }
    }
}
