//! Fixed-point resolution engine.
//!
//! Requirements are expanded breadth-first from the top-level inputs. Each
//! package name holds at most one pin; when a later demand rules the pin
//! out, the pinned version is excluded, everything the old pin declared is
//! retracted and a new candidate is chosen under the merged demands. The
//! run ends when the queue drains, after which pins no longer reachable
//! from an input are pruned.
//!
//! # Example
//!
//! ```
//! use lockwright_resolver::{MemoryRepository, Requirement, resolve};
//! use std::collections::{BTreeMap, BTreeSet};
//!
//! let repo = MemoryRepository::new();
//! repo.add_release("foo", "1.0", &["bar>=1.0,<2.0"]).unwrap();
//! repo.add_release("bar", "1.5", &[]).unwrap();
//!
//! let top = vec![Requirement::parse("foo").unwrap()];
//! let resolved = resolve(&repo, &top, &[], &BTreeMap::new(), &BTreeSet::new()).unwrap();
//! assert_eq!(resolved.get_str("bar").unwrap().to_string(), "bar==1.5");
//! ```

use crate::config::ResolverConfig;
use crate::conflict::{Demand, ResolveError, parent_chain};
use crate::hashes::{HashCollector, HashReport};
use crate::repository::{Candidate, Repository};
use crate::requirement::{Parent, Requirement, display_specifier};
use crate::types::{ResolveRequest, ResolvedSet};
use ahash::{AHashMap, AHashSet};
use lockwright_core::{Error as CoreError, PackageName, Version, VersionSpecifiers};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Resolver statistics for monitoring and debugging.
#[derive(Debug, Default)]
pub struct ResolverStats {
    /// Queue pops across all runs.
    pub iterations: AtomicU64,
    /// Calls to `find_best_candidate`.
    pub candidates_requested: AtomicU64,
    /// Calls to `get_dependencies`.
    pub dependencies_fetched: AtomicU64,
    /// Pins replaced after a conflicting demand.
    pub pins_replaced: AtomicU64,
    /// Time spent resolving (ms).
    pub resolve_time_ms: AtomicU64,
}

impl ResolverStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Lifecycle of a resolution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    /// Inputs are being merged and seeded.
    Collecting,
    /// The queue is being expanded.
    Expanding,
    /// A consistent set was frozen.
    Converged,
    /// The run aborted with an error.
    Failed,
}

impl ResolverState {
    /// Whether moving to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Collecting, Self::Expanding | Self::Failed)
                | (Self::Expanding, Self::Converged | Self::Failed)
        )
    }
}

impl fmt::Display for ResolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Collecting => "collecting",
            Self::Expanding => "expanding",
            Self::Converged => "converged",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The dependency resolver.
pub struct Resolver<R: Repository> {
    repository: Arc<R>,
    config: ResolverConfig,
    stats: Arc<ResolverStats>,
}

impl<R: Repository> fmt::Debug for Resolver<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<R: Repository> Resolver<R> {
    /// Create a resolver over `repository`.
    pub fn new(repository: Arc<R>, config: ResolverConfig) -> Self {
        Self {
            repository,
            config,
            stats: Arc::new(ResolverStats::default()),
        }
    }

    /// Get resolver statistics.
    #[must_use]
    pub fn stats(&self) -> &ResolverStats {
        &self.stats
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The repository in use.
    #[must_use]
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Collect artifact hashes for `resolved` with the configured workers
    /// and failure policy.
    pub fn collect_hashes(&self, resolved: &ResolvedSet) -> Result<HashReport, ResolveError> {
        HashCollector::new(self.repository.as_ref(), self.config.hash_workers)
            .collect_with_policy(resolved, self.config.hash_failure_policy)
    }

    /// Resolve `request` into a pinned set.
    pub fn resolve(&self, request: &ResolveRequest) -> Result<ResolvedSet, ResolveError> {
        let start = Instant::now();
        info!(
            top_level = request.top_level.len(),
            constraints = request.constraints.len(),
            previous_pins = request.previous_pins.len(),
            "starting resolution"
        );

        let mut session = Session::new(self.repository.as_ref(), &self.config, &self.stats, request);
        let result = session.run();

        let elapsed = start.elapsed();
        self.stats.resolve_time_ms.fetch_add(
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );

        match &result {
            Ok(resolved) => info!(
                packages = resolved.len(),
                iterations = session.iterations,
                elapsed_ms = elapsed.as_millis(),
                "resolution complete"
            ),
            Err(err) => warn!(
                error = %err,
                iterations = session.iterations,
                "resolution failed"
            ),
        }
        result
    }
}

/// Resolve top-level requirements with the default configuration.
pub fn resolve<R: Repository>(
    repository: &R,
    top_level: &[Requirement],
    constraints: &[Requirement],
    previous_pins: &BTreeMap<PackageName, Version>,
    upgrade: &BTreeSet<PackageName>,
) -> Result<ResolvedSet, ResolveError> {
    let request = ResolveRequest::new(top_level.iter().cloned())
        .with_constraints(constraints.iter().cloned())
        .with_previous_pins(previous_pins.clone())
        .with_upgrade(upgrade.iter().cloned());
    Resolver::new(Arc::new(repository), ResolverConfig::default()).resolve(&request)
}

/// State of one resolution run.
struct Session<'a, R: Repository> {
    repository: &'a R,
    config: &'a ResolverConfig,
    stats: &'a ResolverStats,
    request: &'a ResolveRequest,
    state: ResolverState,
    iterations: usize,
    queue: VecDeque<Requirement>,
    roots: Vec<PackageName>,
    /// Every active demand per name, in the order it was made.
    demands: BTreeMap<PackageName, Vec<Requirement>>,
    /// Constraint-only demands per name.
    constraints: BTreeMap<PackageName, Vec<Requirement>>,
    pins: BTreeMap<PackageName, Requirement>,
    /// Requirements each pin declared, fetched for that pin only.
    declared: BTreeMap<PackageName, Vec<Requirement>>,
    excluded: AHashMap<PackageName, BTreeSet<Version>>,
}

impl<'a, R: Repository> Session<'a, R> {
    fn new(
        repository: &'a R,
        config: &'a ResolverConfig,
        stats: &'a ResolverStats,
        request: &'a ResolveRequest,
    ) -> Self {
        Self {
            repository,
            config,
            stats,
            request,
            state: ResolverState::Collecting,
            iterations: 0,
            queue: VecDeque::new(),
            roots: Vec::new(),
            demands: BTreeMap::new(),
            constraints: BTreeMap::new(),
            pins: BTreeMap::new(),
            declared: BTreeMap::new(),
            excluded: AHashMap::new(),
        }
    }

    fn run(&mut self) -> Result<ResolvedSet, ResolveError> {
        let result = self.seed().and_then(|()| self.expand());
        match result {
            Ok(()) => {
                self.transition(ResolverState::Converged)?;
                Ok(self.freeze())
            }
            Err(err) => {
                self.transition(ResolverState::Failed)?;
                Err(err)
            }
        }
    }

    fn transition(&mut self, next: ResolverState) -> Result<(), ResolveError> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::IllegalTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            }
            .into());
        }
        trace!(from = %self.state, to = %next, "resolver state");
        self.state = next;
        Ok(())
    }

    /// Merge inputs by name and queue them.
    fn seed(&mut self) -> Result<(), ResolveError> {
        let mut merged: Vec<Requirement> = Vec::new();
        let mut index: AHashMap<PackageName, usize> = AHashMap::new();
        let mut constraints: BTreeMap<PackageName, Requirement> = BTreeMap::new();

        let inputs = self.request.top_level.iter().map(|r| (r, false));
        let extra = self.request.constraints.iter().map(|r| (r, true));
        for (requirement, forced_constraint) in inputs.chain(extra) {
            let mut requirement = requirement.without_parents().with_parent(Parent::Root);
            if forced_constraint {
                requirement.constraint = true;
            }

            if requirement.constraint {
                let entry = match constraints.remove(&requirement.name) {
                    Some(existing) => existing
                        .merge(&requirement)
                        .map_err(|source| ResolveError::IncompatibleConstraints { source })?,
                    None => requirement.clone(),
                };
                constraints.insert(requirement.name.clone(), entry);
                self.constraints
                    .entry(requirement.name.clone())
                    .or_default()
                    .push(requirement);
                continue;
            }

            match index.get(&requirement.name) {
                Some(&i) => {
                    merged[i] = merged[i]
                        .merge(&requirement)
                        .map_err(|source| ResolveError::IncompatibleConstraints { source })?;
                }
                None => {
                    index.insert(requirement.name.clone(), merged.len());
                    merged.push(requirement);
                }
            }
        }

        for requirement in &merged {
            if let Some(constraint) = constraints.get(&requirement.name) {
                requirement
                    .merge(constraint)
                    .map_err(|source| ResolveError::IncompatibleConstraints { source })?;
            }
        }

        debug!(
            inputs = merged.len(),
            constraints = constraints.len(),
            "seeded resolution"
        );
        self.roots = merged.iter().map(|r| r.name.clone()).collect();
        self.queue.extend(merged);
        self.transition(ResolverState::Expanding)
    }

    fn expand(&mut self) -> Result<(), ResolveError> {
        while let Some(requirement) = self.queue.pop_front() {
            self.iterations += 1;
            ResolverStats::bump(&self.stats.iterations);
            if self.iterations > self.config.max_iterations {
                return Err(ResolveError::IterationLimit {
                    iterations: self.config.max_iterations,
                });
            }
            trace!(requirement = %requirement, iteration = self.iterations, "processing");

            if requirement.constraint {
                self.apply_constraint(requirement)?;
            } else {
                self.apply_demand(requirement)?;
            }
        }
        Ok(())
    }

    fn apply_constraint(&mut self, requirement: Requirement) -> Result<(), ResolveError> {
        let name = requirement.name.clone();
        let entries = self.constraints.entry(name.clone()).or_default();
        if !entries.contains(&requirement) {
            entries.push(requirement);
        }

        if !self.pins.contains_key(&name) {
            return Ok(());
        }
        let merged = self.merged_demand(&name)?;
        if self.pins.get(&name).is_some_and(|pin| merged.is_satisfied_by(pin)) {
            return Ok(());
        }
        self.replace_pin(&name)
    }

    fn apply_demand(&mut self, requirement: Requirement) -> Result<(), ResolveError> {
        let name = requirement.name.clone();
        self.demands
            .entry(name.clone())
            .or_default()
            .push(requirement.clone());
        let merged = self.merged_demand(&name)?;

        let Some(pin) = self.pins.get_mut(&name) else {
            let candidate = self.select_candidate(&merged)?.ok_or_else(|| {
                ResolveError::UnresolvableRequirement {
                    requirement: merged.without_parents().to_string(),
                    parent_chain: self.chain_for(&name, &requirement.parents),
                }
            })?;
            return self.install_pin(&name, candidate, &merged);
        };

        if !merged.is_satisfied_by(pin) {
            return self.replace_pin(&name);
        }

        pin.parents.extend(requirement.parents.iter().cloned());
        pin.editable |= merged.editable;
        if merged.extras.is_subset(&pin.extras) {
            return Ok(());
        }

        pin.extras.extend(merged.extras.iter().cloned());
        let pin = pin.clone();
        debug!(package = %name, extras = ?pin.extras, "extras widened");
        let dependencies = self.fetch_dependencies(&pin)?;
        let known = self.declared.entry(name).or_default();
        for dependency in dependencies {
            if !known.contains(&dependency) {
                known.push(dependency.clone());
                self.queue.push_back(dependency);
            }
        }
        Ok(())
    }

    /// Merge every active demand and constraint on `name`.
    fn merged_demand(&self, name: &PackageName) -> Result<Requirement, ResolveError> {
        let mut entries = self
            .demands
            .get(name)
            .into_iter()
            .chain(self.constraints.get(name))
            .flatten();
        let Some(first) = entries.next() else {
            return Err(CoreError::repository(format!("no demands recorded for {name}")).into());
        };
        let mut merged = first.clone();
        for entry in entries {
            merged = merged.merge(entry).map_err(|_| self.conflict(name))?;
        }
        Ok(merged)
    }

    /// Best candidate for `merged`, trying the previous pin first.
    fn select_candidate(&self, merged: &Requirement) -> Result<Option<Candidate>, ResolveError> {
        let excluded = self.excluded.get(&merged.name).cloned().unwrap_or_default();

        if let Some(previous) = self.request.previous_pins.get(&merged.name)
            && self.request.prefers_previous(&merged.name)
            && !merged.is_direct()
            && merged.specifier.contains(previous)
            && !excluded.contains(previous)
        {
            let preferred = merged.clone().with_specifier(
                merged
                    .specifier
                    .intersection(&VersionSpecifiers::exact(previous.clone())),
            );
            ResolverStats::bump(&self.stats.candidates_requested);
            if let Some(candidate) = self.repository.find_best_candidate(&preferred, &excluded)? {
                debug!(package = %merged.name, version = %candidate.version, "keeping previous pin");
                return Ok(Some(candidate));
            }
            debug!(package = %merged.name, version = %previous, "previous pin no longer offered");
        }

        ResolverStats::bump(&self.stats.candidates_requested);
        Ok(self.repository.find_best_candidate(merged, &excluded)?)
    }

    /// Pin `candidate` and queue its dependencies.
    fn install_pin(
        &mut self,
        name: &PackageName,
        candidate: Candidate,
        merged: &Requirement,
    ) -> Result<(), ResolveError> {
        let parents: BTreeSet<Parent> = self
            .demands
            .get(name)
            .into_iter()
            .flatten()
            .flat_map(|demand| demand.parents.iter().cloned())
            .collect();
        let pin = Requirement {
            name: name.clone(),
            specifier: VersionSpecifiers::exact(candidate.version),
            extras: merged.extras.clone(),
            source: candidate.source,
            editable: merged.editable,
            constraint: false,
            parents,
        };
        debug!(pin = %pin, "pinned");

        let dependencies = self.fetch_dependencies(&pin)?;
        self.pins.insert(name.clone(), pin);
        self.queue.extend(dependencies.iter().cloned());
        self.declared.insert(name.clone(), dependencies);
        Ok(())
    }

    /// Drop the current pin of `name`, retract what it declared and pin a
    /// new candidate under the merged demands.
    fn replace_pin(&mut self, name: &PackageName) -> Result<(), ResolveError> {
        let Some(old) = self.pins.remove(name) else {
            return Ok(());
        };
        ResolverStats::bump(&self.stats.pins_replaced);
        if let Some(version) = old.pinned_version() {
            self.excluded
                .entry(name.clone())
                .or_default()
                .insert(version.clone());
        }
        warn!(pin = %old, "pin no longer satisfies its demands, replacing");
        self.retract(name);
        self.drop_orphans();

        if !self.demands.contains_key(name) {
            debug!(package = %name, "no longer demanded after retraction");
            return Ok(());
        }
        let merged = self.merged_demand(name)?;
        let candidate = self
            .select_candidate(&merged)?
            .ok_or_else(|| self.conflict(name))?;
        self.install_pin(name, candidate, &merged)
    }

    /// Remove every demand, constraint and queued requirement that the pin
    /// of `name` declared.
    fn retract(&mut self, name: &PackageName) {
        let parent = Parent::Package(name.clone());
        self.declared.remove(name);
        for table in [&mut self.demands, &mut self.constraints] {
            for entries in table.values_mut() {
                entries.retain(|entry| !entry.parents.contains(&parent));
            }
            table.retain(|_, entries| !entries.is_empty());
        }
        self.queue.retain(|entry| !entry.parents.contains(&parent));
        for pin in self.pins.values_mut() {
            pin.parents.remove(&parent);
        }
    }

    /// Unpin and retract every pin no longer reachable from the inputs.
    ///
    /// Reachability is computed once over the live pins, so a whole branch
    /// left behind by a replaced pin goes in one pass.
    fn drop_orphans(&mut self) {
        let orphans: Vec<PackageName> = {
            let live = self.reachable();
            self.pins
                .keys()
                .filter(|name| !live.contains(name))
                .cloned()
                .collect()
        };
        for orphan in orphans {
            if let Some(pin) = self.pins.remove(&orphan) {
                debug!(pin = %pin, "retracting orphaned pin");
            }
            self.retract(&orphan);
        }
    }

    fn fetch_dependencies(&self, pin: &Requirement) -> Result<Vec<Requirement>, ResolveError> {
        ResolverStats::bump(&self.stats.dependencies_fetched);
        let parent = Parent::Package(pin.name.clone());
        let dependencies = self.repository.get_dependencies(pin)?;
        trace!(pin = %pin, count = dependencies.len(), "fetched dependencies");
        Ok(dependencies
            .into_iter()
            .map(|dependency| dependency.without_parents().with_parent(parent.clone()))
            .collect())
    }

    fn parents_of(&self, name: &PackageName) -> BTreeSet<Parent> {
        self.demands
            .get(name)
            .into_iter()
            .flatten()
            .flat_map(|demand| demand.parents.iter().cloned())
            .collect()
    }

    fn chain_for(&self, origin: &PackageName, parents: &BTreeSet<Parent>) -> Vec<PackageName> {
        parent_chain(origin, parents, |name| self.parents_of(name))
    }

    /// Conflict report listing every active demand on `name`.
    fn conflict(&self, name: &PackageName) -> ResolveError {
        let demands = self
            .demands
            .get(name)
            .into_iter()
            .chain(self.constraints.get(name))
            .flatten()
            .map(|demand| {
                let specifier = match demand.source.url() {
                    Some(url) => format!(" @ {url}"),
                    None => display_specifier(&demand.specifier),
                };
                Demand::new(specifier, self.chain_for(name, &demand.parents))
            })
            .collect();
        ResolveError::VersionConflict {
            name: name.clone(),
            demands,
        }
    }

    /// Pins reachable from the inputs over declared dependencies.
    fn reachable(&self) -> AHashSet<&PackageName> {
        let mut reachable: AHashSet<&PackageName> = AHashSet::new();
        let mut stack: Vec<&PackageName> = self
            .roots
            .iter()
            .filter(|name| self.pins.contains_key(*name))
            .collect();
        while let Some(name) = stack.pop() {
            if !reachable.insert(name) {
                continue;
            }
            for dependency in self.declared_edges(name) {
                if !reachable.contains(dependency) {
                    stack.push(dependency);
                }
            }
        }
        reachable
    }

    /// Prune pins unreachable from the inputs and freeze the rest.
    fn freeze(&self) -> ResolvedSet {
        let reachable = self.reachable();
        let mut edges = Vec::new();
        let mut parents: BTreeMap<&PackageName, BTreeSet<Parent>> = BTreeMap::new();
        for name in &self.roots {
            parents.entry(name).or_default().insert(Parent::Root);
        }
        for name in &reachable {
            for dependency in self.declared_edges(name) {
                edges.push(((*name).clone(), dependency.clone()));
                parents
                    .entry(dependency)
                    .or_default()
                    .insert(Parent::Package((*name).clone()));
            }
        }

        let pins: BTreeMap<PackageName, Requirement> = self
            .pins
            .iter()
            .filter(|(name, _)| reachable.contains(name))
            .map(|(name, pin)| {
                let mut pin = pin.clone();
                pin.parents = parents.get(name).cloned().unwrap_or_default();
                (name.clone(), pin)
            })
            .collect();

        let pruned = self.pins.len() - pins.len();
        if pruned > 0 {
            debug!(pruned, "dropped unreachable pins");
        }
        ResolvedSet::new(pins, edges)
    }

    /// Pinned, non-constraint dependencies declared by `name`.
    fn declared_edges(&self, name: &PackageName) -> impl Iterator<Item = &PackageName> {
        self.declared
            .get(name)
            .into_iter()
            .flatten()
            .filter(|dependency| !dependency.constraint && self.pins.contains_key(&dependency.name))
            .map(|dependency| &dependency.name)
    }
}
