//! Core types for dependency resolution.
//!
//! - `ResolvedSet`: the frozen result of a successful resolution
//! - `ResolveRequest`: everything a resolution run consumes

use crate::requirement::{Parent, Requirement};
use ahash::AHashMap;
use lockwright_core::{PackageName, Version};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet};

/// Pinned requirements keyed by package name, plus the dependency edges
/// between them.
///
/// Every entry is pinned to one version (direct sources additionally keep
/// their URL). Edges point from a package to its dependencies.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSet {
    pins: BTreeMap<PackageName, Requirement>,
    graph: DiGraph<PackageName, ()>,
    indices: AHashMap<PackageName, NodeIndex>,
}

impl ResolvedSet {
    /// Build from pins and `(dependent, dependency)` edges. Edges naming
    /// unknown packages are ignored.
    #[must_use]
    pub fn new(
        pins: BTreeMap<PackageName, Requirement>,
        edges: impl IntoIterator<Item = (PackageName, PackageName)>,
    ) -> Self {
        let mut graph = DiGraph::new();
        let mut indices = AHashMap::with_capacity(pins.len());
        for name in pins.keys() {
            indices.insert(name.clone(), graph.add_node(name.clone()));
        }
        for (from, to) in edges {
            if let (Some(&a), Some(&b)) = (indices.get(&from), indices.get(&to))
                && graph.find_edge(a, b).is_none()
            {
                graph.add_edge(a, b, ());
            }
        }
        Self {
            pins,
            graph,
            indices,
        }
    }

    /// Number of pinned packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    /// Whether nothing was pinned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// The pin for `name`.
    #[must_use]
    pub fn get(&self, name: &PackageName) -> Option<&Requirement> {
        self.pins.get(name)
    }

    /// The pin for a name given as a string (normalized first).
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&Requirement> {
        PackageName::parse(name).and_then(|name| self.pins.get(&name))
    }

    /// Whether `name` is pinned.
    #[must_use]
    pub fn contains(&self, name: &PackageName) -> bool {
        self.pins.contains_key(name)
    }

    /// Pinned version of `name`.
    #[must_use]
    pub fn version(&self, name: &PackageName) -> Option<&Version> {
        self.pins.get(name).and_then(Requirement::pinned_version)
    }

    /// Iterate pins sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&PackageName, &Requirement)> {
        self.pins.iter()
    }

    /// Pinned requirements sorted by name.
    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.pins.values()
    }

    /// `name -> version` map, the shape a previous lockfile provides.
    #[must_use]
    pub fn to_pins(&self) -> BTreeMap<PackageName, Version> {
        self.pins
            .iter()
            .filter_map(|(name, req)| Some((name.clone(), req.pinned_version()?.clone())))
            .collect()
    }

    /// Pins as top-level input for another run: parents cleared and marked
    /// as roots.
    #[must_use]
    pub fn as_input(&self) -> Vec<Requirement> {
        self.pins
            .values()
            .map(|req| req.without_parents().with_parent(Parent::Root))
            .collect()
    }

    /// Direct dependencies of `name`, sorted.
    #[must_use]
    pub fn dependencies(&self, name: &PackageName) -> Vec<&PackageName> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Packages depending on `name`, sorted.
    #[must_use]
    pub fn dependents(&self, name: &PackageName) -> Vec<&PackageName> {
        self.neighbors(name, Direction::Incoming)
    }

    fn neighbors(&self, name: &PackageName, direction: Direction) -> Vec<&PackageName> {
        let Some(&idx) = self.indices.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<&PackageName> = self
            .graph
            .neighbors_directed(idx, direction)
            .filter_map(|n| self.graph.node_weight(n))
            .collect();
        names.sort();
        names
    }

    /// Requirement graph.
    #[must_use]
    pub const fn graph(&self) -> &DiGraph<PackageName, ()> {
        &self.graph
    }

    /// Comparable view ignoring provenance.
    fn pin_view(&self) -> BTreeMap<&PackageName, Requirement> {
        self.pins
            .iter()
            .map(|(name, req)| (name, req.without_parents()))
            .collect()
    }
}

/// Two sets are equal when they pin the same packages the same way;
/// parents and edges are not compared.
impl PartialEq for ResolvedSet {
    fn eq(&self, other: &Self) -> bool {
        self.pin_view() == other.pin_view()
    }
}

impl Eq for ResolvedSet {}

/// Inputs of a resolution run.
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    /// Top-level requirements.
    pub top_level: Vec<Requirement>,
    /// Constraint-only requirements.
    pub constraints: Vec<Requirement>,
    /// Versions from a previous lockfile, used as soft preferences.
    pub previous_pins: BTreeMap<PackageName, Version>,
    /// Names resolved fresh, ignoring previous pins.
    pub upgrade: BTreeSet<PackageName>,
    /// Ignore every previous pin.
    pub upgrade_all: bool,
}

impl ResolveRequest {
    /// A request for the given top-level requirements.
    #[must_use]
    pub fn new(top_level: impl IntoIterator<Item = Requirement>) -> Self {
        Self {
            top_level: top_level.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Add constraints.
    #[must_use]
    pub fn with_constraints(mut self, constraints: impl IntoIterator<Item = Requirement>) -> Self {
        self.constraints.extend(constraints);
        self
    }

    /// Set previous pins.
    #[must_use]
    pub fn with_previous_pins(mut self, pins: BTreeMap<PackageName, Version>) -> Self {
        self.previous_pins = pins;
        self
    }

    /// Mark names for upgrade.
    #[must_use]
    pub fn with_upgrade(mut self, names: impl IntoIterator<Item = PackageName>) -> Self {
        self.upgrade.extend(names);
        self
    }

    /// Ignore all previous pins.
    #[must_use]
    pub fn with_upgrade_all(mut self) -> Self {
        self.upgrade_all = true;
        self
    }

    /// Whether the previous pin of `name` should be tried first.
    #[must_use]
    pub fn prefers_previous(&self, name: &PackageName) -> bool {
        !self.upgrade_all && !self.upgrade.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> PackageName {
        s.parse().unwrap()
    }

    fn set() -> ResolvedSet {
        let mut pins = BTreeMap::new();
        for (n, v) in [("foo", "1.0"), ("bar", "1.5"), ("baz", "0.1")] {
            pins.insert(
                name(n),
                Requirement::pinned(name(n), Version::parse(v).unwrap()).with_parent(Parent::Root),
            );
        }
        ResolvedSet::new(
            pins,
            [
                (name("foo"), name("bar")),
                (name("foo"), name("baz")),
                (name("bar"), name("baz")),
                (name("foo"), name("missing")),
            ],
        )
    }

    #[test]
    fn graph_queries() {
        let set = set();
        assert_eq!(set.dependencies(&name("foo")), vec![&name("bar"), &name("baz")]);
        assert_eq!(set.dependents(&name("baz")), vec![&name("bar"), &name("foo")]);
        assert!(set.dependencies(&name("missing")).is_empty());
        assert_eq!(set.graph().edge_count(), 3);
    }

    #[test]
    fn lookups() {
        let set = set();
        assert_eq!(set.len(), 3);
        assert_eq!(set.version(&name("bar")).unwrap().to_string(), "1.5");
        assert!(set.get_str("Foo").is_some());
        assert_eq!(set.to_pins().len(), 3);
    }

    #[test]
    fn equality_ignores_parents() {
        let a = set();
        let b = ResolvedSet::new(
            a.as_input()
                .into_iter()
                .map(|r| (r.name.clone(), r.without_parents()))
                .collect(),
            std::iter::empty(),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn upgrade_preferences() {
        let request = ResolveRequest::default().with_upgrade([name("b")]);
        assert!(request.prefers_previous(&name("a")));
        assert!(!request.prefers_previous(&name("b")));
        assert!(!request.with_upgrade_all().prefers_previous(&name("a")));
    }
}
