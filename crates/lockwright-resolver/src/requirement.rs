//! Requirement model.
//!
//! A [`Requirement`] names a package together with the versions it accepts,
//! the extras it asks for, and where it comes from (the package index, a
//! version-control checkout, or a local path / archive URL).

use lockwright_core::{Error, PackageName, Result, Version, VersionSpecifiers};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use url::Url;

/// URL scheme prefixes that mark a version-control source.
const VCS_PREFIXES: [&str; 4] = ["git", "hg", "svn", "bzr"];

/// Where a requirement's distribution comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RequirementSource {
    /// Versioned release from the package index.
    #[default]
    Registry,
    /// Version-control checkout (`git+https://host/repo@ref`).
    Vcs {
        /// Repository URL including the `vcs+` prefix.
        url: String,
        /// Branch, tag or commit.
        reference: Option<String>,
        /// Project directory inside the checkout.
        subdirectory: Option<String>,
    },
    /// Local directory, local archive or direct archive URL.
    Local {
        /// Path or URL as written.
        url: String,
    },
}

impl RequirementSource {
    /// Whether this is a VCS or local source.
    #[must_use]
    pub const fn is_direct(&self) -> bool {
        !matches!(self, Self::Registry)
    }

    /// Whether this is a version-control source.
    #[must_use]
    pub const fn is_vcs(&self) -> bool {
        matches!(self, Self::Vcs { .. })
    }

    /// The URL as written, for direct sources.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Registry => None,
            Self::Vcs { url, .. } | Self::Local { url } => Some(url),
        }
    }

    /// Comparison key for direct sources: the normalized URL plus the
    /// reference and subdirectory.
    #[must_use]
    pub fn identity(&self) -> Option<String> {
        match self {
            Self::Registry => None,
            Self::Vcs {
                url,
                reference,
                subdirectory,
            } => Some(format!(
                "{}@{}#{}",
                normalize_url(url),
                reference.as_deref().unwrap_or_default(),
                subdirectory.as_deref().unwrap_or_default()
            )),
            Self::Local { url } => Some(normalize_url(url)),
        }
    }

    /// The URL line without project name, e.g. `git+https://host/repo@v1`.
    fn locator(&self) -> String {
        match self {
            Self::Registry => String::new(),
            Self::Vcs { url, reference, .. } => match reference {
                Some(reference) => format!("{url}@{reference}"),
                None => url.clone(),
            },
            Self::Local { url } => url.clone(),
        }
    }

    fn subdirectory(&self) -> Option<&str> {
        match self {
            Self::Vcs { subdirectory, .. } => subdirectory.as_deref(),
            _ => None,
        }
    }
}

impl PartialEq for RequirementSource {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for RequirementSource {}

impl Hash for RequirementSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

/// Normalize a source URL for comparison.
///
/// Lowercases scheme and host and ignores a trailing slash or `.git`
/// suffix. Strings that are not URLs (plain paths) only get the suffix
/// treatment.
///
/// ```
/// use lockwright_resolver::normalize_url;
///
/// assert_eq!(
///     normalize_url("git+HTTPS://GitHub.com/org/repo.git/"),
///     normalize_url("git+https://github.com/org/repo"),
/// );
/// ```
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let (vcs, rest) = match trimmed.split_once('+') {
        Some((prefix, rest)) if VCS_PREFIXES.contains(&prefix.to_ascii_lowercase().as_str()) => {
            (Some(prefix.to_ascii_lowercase()), rest)
        }
        _ => (None, trimmed),
    };

    let mut normalized = match Url::parse(rest) {
        Ok(url) => url.to_string(),
        Err(_) => rest.to_string(),
    };
    while normalized.ends_with('/') {
        normalized.pop();
    }
    if let Some(stripped) = normalized.strip_suffix(".git") {
        normalized.truncate(stripped.len());
    }
    while normalized.ends_with('/') {
        normalized.pop();
    }

    match vcs {
        Some(prefix) => format!("{prefix}+{normalized}"),
        None => normalized,
    }
}

/// What introduced a requirement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Parent {
    /// Declared as top-level input.
    Root,
    /// Declared as a dependency of this package.
    Package(PackageName),
}

impl fmt::Display for Parent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("<input>"),
            Self::Package(name) => write!(f, "{name}"),
        }
    }
}

/// A package requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    /// Normalized package name.
    pub name: PackageName,
    /// Accepted versions.
    pub specifier: VersionSpecifiers,
    /// Requested extras (normalized).
    pub extras: BTreeSet<String>,
    /// Distribution source.
    pub source: RequirementSource,
    /// Development-mode install.
    pub editable: bool,
    /// Restricts versions without justifying inclusion.
    pub constraint: bool,
    /// What introduced this requirement.
    pub parents: BTreeSet<Parent>,
}

impl Requirement {
    /// A registry requirement accepting any version.
    #[must_use]
    pub fn new(name: PackageName) -> Self {
        Self {
            name,
            specifier: VersionSpecifiers::any(),
            extras: BTreeSet::new(),
            source: RequirementSource::Registry,
            editable: false,
            constraint: false,
            parents: BTreeSet::new(),
        }
    }

    /// A registry requirement pinned to `version`.
    #[must_use]
    pub fn pinned(name: PackageName, version: Version) -> Self {
        Self::new(name).with_specifier(VersionSpecifiers::exact(version))
    }

    /// Replace the specifier.
    #[must_use]
    pub fn with_specifier(mut self, specifier: VersionSpecifiers) -> Self {
        self.specifier = specifier;
        self
    }

    /// Replace the source.
    #[must_use]
    pub fn with_source(mut self, source: RequirementSource) -> Self {
        self.source = source;
        self
    }

    /// Add an extra; the name is normalized like a package name.
    pub fn with_extra(mut self, extra: &str) -> Result<Self> {
        self.extras.insert(normalize_extra(extra)?);
        Ok(self)
    }

    /// Add a parent.
    #[must_use]
    pub fn with_parent(mut self, parent: Parent) -> Self {
        self.parents.insert(parent);
        self
    }

    /// Mark as constraint-only.
    #[must_use]
    pub fn as_constraint(mut self) -> Self {
        self.constraint = true;
        self
    }

    /// Mark as editable.
    #[must_use]
    pub fn as_editable(mut self) -> Self {
        self.editable = true;
        self
    }

    /// Parse a requirement line.
    ///
    /// Accepted forms:
    ///
    /// - `name[extra1,extra2]>=1.0,<2.0`
    /// - `name (>=1.0)`
    /// - `name @ <url>`
    /// - `git+https://host/repo@ref#egg=name&subdirectory=dir`
    /// - `file:///path/to/project#egg=name`
    /// - `-e <any direct form>` for editable installs
    ///
    /// Environment markers (`; python_version < "3"`) are rejected.
    pub fn parse(line: &str) -> Result<Self> {
        let original = line;
        let line = strip_comment(line).trim();
        if line.is_empty() {
            return Err(Error::invalid_requirement(original, "empty requirement"));
        }

        let (editable, body) = match line
            .strip_prefix("-e ")
            .or_else(|| line.strip_prefix("--editable "))
            .or_else(|| line.strip_prefix("--editable="))
        {
            Some(rest) => (true, rest.trim()),
            None => (false, line),
        };

        if body.contains(';') {
            return Err(Error::invalid_requirement(
                original,
                "environment markers are not supported",
            ));
        }

        let mut requirement = if looks_like_url(body) {
            parse_direct(original, body, None)?
        } else {
            let (name, extras, rest) = parse_name_and_extras(original, body)?;
            let rest = rest.trim();
            if let Some(url) = rest.strip_prefix('@') {
                let mut req = parse_direct(original, url.trim(), Some(name))?;
                req.extras.extend(extras);
                req
            } else {
                let spec_text = rest
                    .strip_prefix('(')
                    .and_then(|s| s.strip_suffix(')'))
                    .unwrap_or(rest);
                let mut req = Self::new(name).with_specifier(VersionSpecifiers::parse(spec_text)?);
                req.extras = extras;
                req
            }
        };

        if editable {
            if !requirement.source.is_direct() {
                return Err(Error::invalid_requirement(
                    original,
                    "editable requirements need a VCS or local source",
                ));
            }
            requirement.editable = true;
        }

        Ok(requirement)
    }

    /// Combine two requirements for the same package.
    ///
    /// Specifiers are intersected; extras and parents are unioned;
    /// `editable` is ORed and `constraint` is ANDed. A direct source wins
    /// over the registry; two different direct sources cannot be merged.
    pub fn merge(&self, other: &Self) -> Result<Self> {
        if self.name != other.name {
            return Err(Error::NameMismatch {
                left: self.name.to_string(),
                right: other.name.to_string(),
            });
        }

        let specifier = self.specifier.intersection(&other.specifier);
        if specifier.is_empty() {
            return Err(Error::incompatible(
                self.name.as_str(),
                display_specifier(&self.specifier),
                display_specifier(&other.specifier),
            ));
        }

        let source = match (&self.source, &other.source) {
            (RequirementSource::Registry, source) | (source, RequirementSource::Registry) => {
                source.clone()
            }
            (left, right) if left == right => left.clone(),
            (left, right) => {
                return Err(Error::incompatible(
                    self.name.as_str(),
                    left.locator(),
                    right.locator(),
                ));
            }
        };

        Ok(Self {
            name: self.name.clone(),
            specifier,
            extras: self.extras.union(&other.extras).cloned().collect(),
            source,
            editable: self.editable || other.editable,
            constraint: self.constraint && other.constraint,
            parents: self.parents.union(&other.parents).cloned().collect(),
        })
    }

    /// `(name, version, extras)` of a pinned requirement.
    pub fn as_pinned_tuple(&self) -> Result<(PackageName, Version, BTreeSet<String>)> {
        let version = self
            .specifier
            .exact_version()
            .ok_or_else(|| Error::not_pinned("as_pinned_tuple", self))?;
        Ok((self.name.clone(), version.clone(), self.extras.clone()))
    }

    /// The single version this requirement pins, if any.
    #[must_use]
    pub fn pinned_version(&self) -> Option<&Version> {
        self.specifier.exact_version()
    }

    /// Whether this requirement has a concrete source to discover
    /// dependencies from: an exact registry version or a direct source.
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.source.is_direct() || self.specifier.is_exact()
    }

    /// Whether this requirement only restricts versions.
    #[must_use]
    pub const fn is_constraint(&self) -> bool {
        self.constraint
    }

    /// Whether this requirement comes from a VCS or local source.
    #[must_use]
    pub const fn is_direct(&self) -> bool {
        self.source.is_direct()
    }

    /// Whether `pin` satisfies this requirement's version and source.
    ///
    /// Extras are not considered.
    #[must_use]
    pub fn is_satisfied_by(&self, pin: &Self) -> bool {
        let Some(version) = pin.pinned_version() else {
            return false;
        };
        if !self.specifier.contains(version) {
            return false;
        }
        match &self.source {
            RequirementSource::Registry => true,
            wanted => *wanted == pin.source,
        }
    }

    /// Copy of this requirement without parents, for cache keys and
    /// equality that ignores provenance.
    #[must_use]
    pub fn without_parents(&self) -> Self {
        Self {
            parents: BTreeSet::new(),
            ..self.clone()
        }
    }

    fn extras_suffix(&self) -> String {
        if self.extras.is_empty() {
            String::new()
        } else {
            let extras: Vec<&str> = self.extras.iter().map(String::as_str).collect();
            format!("[{}]", extras.join(","))
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.source.is_direct() {
            return write!(f, "{}{}{}", self.name, self.extras_suffix(), self.specifier);
        }

        if self.editable {
            f.write_str("-e ")?;
        }
        write!(
            f,
            "{}#egg={}{}",
            self.source.locator(),
            self.name,
            self.extras_suffix()
        )?;
        if let Some(subdirectory) = self.source.subdirectory() {
            write!(f, "&subdirectory={subdirectory}")?;
        }
        Ok(())
    }
}

impl FromStr for Requirement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Render a specifier for messages, using `<any>` when it has no clauses.
#[must_use]
pub fn display_specifier(specifier: &VersionSpecifiers) -> String {
    if specifier.is_any() {
        "<any>".to_string()
    } else {
        specifier.to_string()
    }
}

fn normalize_extra(extra: &str) -> Result<String> {
    PackageName::parse(extra)
        .map(|name| name.as_str().to_string())
        .ok_or_else(|| Error::invalid_requirement(extra, "invalid extra name"))
}

fn strip_comment(line: &str) -> &str {
    if line.starts_with('#') {
        return "";
    }
    match line.find(" #") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn looks_like_url(text: &str) -> bool {
    let has_scheme = text.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+')
    });
    has_scheme
        || text.starts_with("file:")
        || text.starts_with("./")
        || text.starts_with("../")
        || text.starts_with('/')
}

fn parse_name_and_extras<'a>(
    original: &str,
    text: &'a str,
) -> Result<(PackageName, BTreeSet<String>, &'a str)> {
    let text = text.trim();
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(text.len());
    let name = PackageName::parse(&text[..end])
        .ok_or_else(|| Error::invalid_requirement(original, "invalid project name"))?;

    let rest = text[end..].trim_start();
    let Some(after_bracket) = rest.strip_prefix('[') else {
        return Ok((name, BTreeSet::new(), rest));
    };
    let close = after_bracket
        .find(']')
        .ok_or_else(|| Error::invalid_requirement(original, "unclosed extras bracket"))?;

    let extras = after_bracket[..close]
        .split(',')
        .map(str::trim)
        .filter(|extra| !extra.is_empty())
        .map(normalize_extra)
        .collect::<Result<BTreeSet<_>>>()?;

    Ok((name, extras, &after_bracket[close + 1..]))
}

/// Parse a direct-source locator, taking the name from `#egg=` unless one
/// was given (`name @ url`).
fn parse_direct(original: &str, text: &str, name: Option<PackageName>) -> Result<Requirement> {
    let (base, fragment) = match text.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (text, None),
    };

    let mut egg = None;
    let mut subdirectory = None;
    for pair in fragment.unwrap_or_default().split('&') {
        match pair.split_once('=') {
            Some(("egg", value)) => egg = Some(value),
            Some(("subdirectory", value)) => subdirectory = Some(value.to_string()),
            _ => {}
        }
    }

    let (name, extras) = match (name, egg) {
        (Some(name), _) => (name, BTreeSet::new()),
        (None, Some(egg)) => {
            let (name, extras, rest) = parse_name_and_extras(original, egg)?;
            if !rest.trim().is_empty() {
                return Err(Error::invalid_requirement(original, "malformed #egg= fragment"));
            }
            (name, extras)
        }
        (None, None) => {
            return Err(Error::invalid_requirement(
                original,
                "cannot determine project name, add #egg=<name>",
            ));
        }
    };

    let is_vcs = base
        .split_once('+')
        .is_some_and(|(prefix, _)| VCS_PREFIXES.contains(&prefix.to_ascii_lowercase().as_str()));

    let source = if is_vcs {
        // The reference follows the last `@` in the path, after the host.
        let path_start = base
            .find("://")
            .and_then(|scheme_end| {
                base[scheme_end + 3..]
                    .find('/')
                    .map(|slash| scheme_end + 3 + slash)
            })
            .unwrap_or(base.len());
        let (url, reference) = match base[path_start..].rfind('@') {
            Some(at) => (
                &base[..path_start + at],
                Some(base[path_start + at + 1..].to_string()),
            ),
            None => (base, None),
        };
        RequirementSource::Vcs {
            url: url.to_string(),
            reference: reference.filter(|r| !r.is_empty()),
            subdirectory,
        }
    } else {
        RequirementSource::Local {
            url: base.to_string(),
        }
    };

    let mut requirement = Requirement::new(name).with_source(source);
    requirement.extras = extras;
    Ok(requirement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn req(line: &str) -> Requirement {
        Requirement::parse(line).unwrap()
    }

    mod parsing {
        use super::*;
        use pretty_assertions::assert_eq;

        #[rstest]
        #[case("Django>=1.8", "django>=1.8")]
        #[case("small_fake_a == 0.1", "small-fake-a==0.1")]
        #[case("foo[Security, tls]<2.0,>=1.0", "foo[security,tls]>=1.0,<2.0")]
        #[case("foo (>=1.0)", "foo>=1.0")]
        #[case("six", "six")]
        #[case("six  # pinned for py2", "six")]
        fn registry_lines(#[case] line: &str, #[case] expected: &str) {
            assert_eq!(req(line).to_string(), expected);
        }

        #[test]
        fn vcs_with_ref_and_subdirectory() {
            let r = req("-e git+https://github.com/org/repo.git@v1.2#egg=Repo_Pkg&subdirectory=python");
            assert!(r.editable);
            assert_eq!(r.name.as_str(), "repo-pkg");
            match &r.source {
                RequirementSource::Vcs {
                    url,
                    reference,
                    subdirectory,
                } => {
                    assert_eq!(url, "git+https://github.com/org/repo.git");
                    assert_eq!(reference.as_deref(), Some("v1.2"));
                    assert_eq!(subdirectory.as_deref(), Some("python"));
                }
                other => panic!("unexpected source {other:?}"),
            }
            assert_eq!(
                r.to_string(),
                "-e git+https://github.com/org/repo.git@v1.2#egg=repo-pkg&subdirectory=python"
            );
        }

        #[test]
        fn vcs_ssh_user_is_not_a_reference() {
            let r = req("git+ssh://git@github.com/org/repo.git#egg=repo");
            assert_eq!(
                r.source,
                RequirementSource::Vcs {
                    url: "git+ssh://git@github.com/org/repo.git".to_string(),
                    reference: None,
                    subdirectory: None,
                }
            );
        }

        #[test]
        fn local_file_url() {
            let r = req("file:///tmp/small_fake_package#egg=small-fake-package");
            assert!(r.is_direct());
            assert!(!r.editable);
            assert_eq!(r.source.url(), Some("file:///tmp/small_fake_package"));
        }

        #[test]
        fn direct_reference() {
            let r = req("foo[bar] @ https://example.com/foo-1.0.tar.gz");
            assert_eq!(r.name.as_str(), "foo");
            assert!(r.extras.contains("bar"));
            assert_eq!(r.source.url(), Some("https://example.com/foo-1.0.tar.gz"));
        }

        #[rstest]
        #[case("", "empty requirement")]
        #[case("-e six", "editable requirements")]
        #[case("foo>=1.0; python_version<'3'", "environment markers")]
        #[case("-e ./local/project", "#egg=")]
        #[case("foo[bar", "unclosed extras")]
        #[case("@@", "invalid project name")]
        fn rejects(#[case] line: &str, #[case] reason: &str) {
            let err = Requirement::parse(line).unwrap_err();
            assert!(err.to_string().contains(reason), "{err}");
        }
    }

    mod merging {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn intersects_specifiers_and_unions_sets() {
            let a = req("foo[x]>=1.0").with_parent(Parent::Root);
            let b = req("foo[y]<2.0").with_parent(Parent::Package("bar".parse().unwrap()));
            let merged = a.merge(&b).unwrap();
            assert_eq!(merged.to_string(), "foo[x,y]>=1.0,<2.0");
            assert_eq!(merged.parents.len(), 2);
        }

        #[test]
        fn empty_intersection_is_incompatible() {
            let err = req("foo==1.0").merge(&req("foo==2.0")).unwrap_err();
            assert_eq!(err.code(), lockwright_core::ErrorCode::E0105);
        }

        #[test]
        fn different_names_are_a_contract_violation() {
            let err = req("foo").merge(&req("bar")).unwrap_err();
            assert!(err.is_contract_violation());
        }

        #[test]
        fn direct_source_wins_over_registry() {
            let merged = req("repo>=1.0")
                .merge(&req("-e git+https://github.com/org/repo#egg=repo"))
                .unwrap();
            assert!(merged.editable);
            assert!(merged.source.is_vcs());
            assert_eq!(merged.specifier.to_string(), ">=1.0");
        }

        #[test]
        fn equivalent_urls_merge() {
            let a = req("git+https://GitHub.com/org/repo.git#egg=repo");
            let b = req("git+https://github.com/org/repo/#egg=repo");
            assert!(a.merge(&b).is_ok());
        }

        #[test]
        fn conflicting_urls_are_incompatible() {
            let a = req("git+https://github.com/org/repo@v1#egg=repo");
            let b = req("git+https://github.com/org/repo@v2#egg=repo");
            assert!(a.merge(&b).is_err());
        }

        #[test]
        fn flags_combine() {
            let constraint = req("foo<3").as_constraint();
            let demand = req("foo>=1");
            assert!(!constraint.merge(&demand).unwrap().constraint);
            assert!(constraint.merge(&constraint).unwrap().constraint);
        }

        #[test]
        fn merge_is_commutative() {
            let a = req("foo[x]>=1.0,!=1.3");
            let b = req("foo<2.0").with_parent(Parent::Root);
            assert_eq!(a.merge(&b).unwrap(), b.merge(&a).unwrap());
        }
    }

    mod pinning {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn pinned_tuple() {
            let (name, version, extras) = req("Foo[b,a]==1.2").as_pinned_tuple().unwrap();
            assert_eq!(name.as_str(), "foo");
            assert_eq!(version.to_string(), "1.2");
            assert_eq!(extras.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
        }

        #[rstest]
        #[case("foo")]
        #[case("foo==1.*")]
        #[case("foo>1,<2")]
        #[case("foo>=1.0")]
        fn not_pinned(#[case] line: &str) {
            let err = req(line).as_pinned_tuple().unwrap_err();
            assert!(err.is_contract_violation());
        }

        #[test]
        fn merged_pins_yield_narrower() {
            let merged = req("foo>=1.0").merge(&req("foo==1.5")).unwrap();
            let (_, version, _) = merged.as_pinned_tuple().unwrap();
            assert_eq!(version.to_string(), "1.5");
        }

        #[test]
        fn satisfaction_checks_version_and_source() {
            let pin = Requirement::pinned("foo".parse().unwrap(), Version::parse("1.5").unwrap());
            assert!(req("foo>=1.0").is_satisfied_by(&pin));
            assert!(!req("foo<1.5").is_satisfied_by(&pin));
            assert!(!req("git+https://h/foo#egg=foo").is_satisfied_by(&pin));
        }
    }

    #[test]
    fn normalize_url_variants() {
        assert_eq!(
            normalize_url("https://Example.COM/path/"),
            normalize_url("https://example.com/path")
        );
        assert_eq!(normalize_url("./local/pkg/"), "./local/pkg");
    }

    #[test]
    fn display_specifier_any() {
        assert_eq!(display_specifier(&VersionSpecifiers::any()), "<any>");
    }
}
