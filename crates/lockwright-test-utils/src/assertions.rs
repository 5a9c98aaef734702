//! Custom assertion helpers for Lockwright testing.
//!
//! This module provides domain-specific assertions for verifying
//! resolved sets, conflict reports and rendered lockfiles.

use anyhow::{Context, Result, bail};
use lockwright_core::PackageName;
use lockwright_lockfile::read_previous_pins;
use lockwright_resolver::{Demand, Requirement, ResolveError, ResolvedSet};

/// Assert that `name` is pinned to exactly `version`.
pub fn assert_pinned(resolved: &ResolvedSet, name: &str, version: &str) -> Result<()> {
    let pin = resolved
        .get_str(name)
        .with_context(|| format!("{name} is not in the resolved set"))?;
    let pinned = pin
        .pinned_version()
        .with_context(|| format!("{name} resolved without an exact version: {pin}"))?;
    if pinned.to_string() != version {
        bail!("{name} pinned to {pinned}, expected {version}");
    }
    Ok(())
}

/// Assert that `name` is absent from the resolved set.
pub fn assert_not_pinned(resolved: &ResolvedSet, name: &str) -> Result<()> {
    if let Some(pin) = resolved.get_str(name) {
        bail!("{name} should not be resolved, found {pin}");
    }
    Ok(())
}

/// Assert that the resolved set holds exactly the given `name==version`
/// pins and nothing else.
pub fn assert_pins(resolved: &ResolvedSet, expected: &[&str]) -> Result<()> {
    let mut wanted = Vec::with_capacity(expected.len());
    for line in expected {
        let (name, version) = line
            .split_once("==")
            .with_context(|| format!("expected pin {line} is not name==version"))?;
        let name: PackageName = name
            .parse()
            .with_context(|| format!("expected pin {line} has an invalid name"))?;
        wanted.push(format!("{name}=={version}"));
    }
    wanted.sort();

    let actual: Vec<String> = resolved
        .iter()
        .map(|(name, pin)| match pin.pinned_version() {
            Some(version) => format!("{name}=={version}"),
            None => format!("{name} (unpinned)"),
        })
        .collect();

    if actual != wanted {
        bail!("resolved pins differ\n  expected: {wanted:?}\n  actual:   {actual:?}");
    }
    Ok(())
}

/// Assert that every top-level requirement is satisfied by its pin.
pub fn assert_demands_satisfied(resolved: &ResolvedSet, top_level: &[Requirement]) -> Result<()> {
    for requirement in top_level {
        let pin = resolved
            .get(&requirement.name)
            .with_context(|| format!("top-level {requirement} is missing from the result"))?;
        if !requirement.is_satisfied_by(pin) {
            bail!("top-level {requirement} is not satisfied by {pin}");
        }
        if !requirement.extras.is_subset(&pin.extras) {
            bail!("top-level {requirement} asked for extras the pin {pin} lacks");
        }
    }
    Ok(())
}

/// Assert that every pin's dependencies are themselves pinned.
pub fn assert_closed(resolved: &ResolvedSet) -> Result<()> {
    for (name, _) in resolved.iter() {
        for dependency in resolved.dependencies(name) {
            if !resolved.contains(dependency) {
                bail!("{name} depends on {dependency}, which is not pinned");
            }
        }
    }
    Ok(())
}

/// Assert that a rendered lockfile pins exactly `expected` (as
/// `name==version`). Editable and direct entries are not counted.
pub fn assert_lockfile_pins(text: &str, expected: &[&str]) -> Result<()> {
    let pins = read_previous_pins(text).context("lockfile does not parse")?;
    let mut actual: Vec<String> = pins
        .iter()
        .map(|(name, version)| format!("{name}=={version}"))
        .collect();
    actual.sort();
    let mut wanted: Vec<String> = expected.iter().map(ToString::to_string).collect();
    wanted.sort();
    if actual != wanted {
        bail!("lockfile pins differ\n  expected: {wanted:?}\n  actual:   {actual:?}");
    }
    Ok(())
}

/// Assert that `err` is a version conflict on `name` listing exactly the
/// given `(specifier, parent chain)` demands, in order.
pub fn assert_conflict(err: &ResolveError, name: &str, expected: &[(&str, &[&str])]) -> Result<()> {
    let ResolveError::VersionConflict {
        name: actual_name,
        demands,
    } = err
    else {
        bail!("expected a version conflict on {name}, got: {err}");
    };
    if actual_name.as_str() != name {
        bail!("conflict names {actual_name}, expected {name}");
    }

    let mut wanted = Vec::with_capacity(expected.len());
    for (specifier, chain) in expected {
        let chain = chain
            .iter()
            .map(|parent| {
                parent
                    .parse::<PackageName>()
                    .with_context(|| format!("invalid parent name {parent}"))
            })
            .collect::<Result<Vec<_>>>()?;
        wanted.push(Demand::new(*specifier, chain));
    }
    if *demands != wanted {
        bail!("conflict demands differ\n  expected: {wanted:?}\n  actual:   {demands:?}");
    }
    Ok(())
}
