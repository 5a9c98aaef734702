//! Version specifiers.
//!
//! A [`VersionSpecifiers`] is a conjunction of comparison clauses
//! (`>=1.0,<2.0,!=1.3`). The clauses are kept for display while a
//! [`version_ranges::Ranges`] carries the set of admitted versions, which
//! makes intersection and emptiness checks exact.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use version_ranges::Ranges;

use crate::error::{Error, Result};
use crate::version::Version;

/// Comparison operator of a specifier clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operator {
    /// `~=` compatible release.
    Compatible,
    /// `==` (or `==V.*` when wildcarded).
    Equal,
    /// `===` arbitrary equality.
    ArbitraryEqual,
    /// `!=` (or `!=V.*` when wildcarded).
    NotEqual,
    /// `>=`
    GreaterThanEqual,
    /// `>`
    GreaterThan,
    /// `<=`
    LessThanEqual,
    /// `<`
    LessThan,
}

impl Operator {
    /// Operator token as written in requirement lines.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Compatible => "~=",
            Self::Equal => "==",
            Self::ArbitraryEqual => "===",
            Self::NotEqual => "!=",
            Self::GreaterThanEqual => ">=",
            Self::GreaterThan => ">",
            Self::LessThanEqual => "<=",
            Self::LessThan => "<",
        }
    }

    /// Split a clause into its operator and the remainder.
    fn split(input: &str) -> Option<(Self, &str)> {
        // Longest tokens first.
        const TOKENS: [(&str, Operator); 8] = [
            ("===", Operator::ArbitraryEqual),
            ("~=", Operator::Compatible),
            ("==", Operator::Equal),
            ("!=", Operator::NotEqual),
            ("<=", Operator::LessThanEqual),
            (">=", Operator::GreaterThanEqual),
            ("<", Operator::LessThan),
            (">", Operator::GreaterThan),
        ];
        TOKENS
            .iter()
            .find_map(|(token, op)| input.strip_prefix(token).map(|rest| (*op, rest)))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single comparison clause such as `>=1.2` or `==1.4.*`.
///
/// Clauses order by version first, so a specifier renders as
/// `~=1.1,>1.2,<1.5`.
#[derive(Debug, Clone)]
pub struct Clause {
    version: Version,
    operator: Operator,
    wildcard: bool,
}

impl PartialEq for Clause {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Clause {}

impl Hash for Clause {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.version.hash(state);
        self.version.release().len().hash(state);
        self.operator.hash(state);
        self.wildcard.hash(state);
    }
}

impl PartialOrd for Clause {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Clause {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.version
            .cmp(&other.version)
            .then_with(|| self.version.release().len().cmp(&other.version.release().len()))
            .then_with(|| self.operator.cmp(&other.operator))
            .then_with(|| self.wildcard.cmp(&other.wildcard))
    }
}

impl Clause {
    /// Create a clause without a wildcard.
    #[must_use]
    pub const fn new(operator: Operator, version: Version) -> Self {
        Self {
            version,
            operator,
            wildcard: false,
        }
    }

    /// Parse one clause.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let (operator, rest) = Operator::split(trimmed)
            .ok_or_else(|| Error::invalid_specifier(trimmed, "missing comparison operator"))?;
        let rest = rest.trim();

        let (version_str, wildcard) = match rest.strip_suffix(".*") {
            Some(prefix) => (prefix, true),
            None => (rest, false),
        };

        if wildcard && !matches!(operator, Operator::Equal | Operator::NotEqual) {
            return Err(Error::invalid_specifier(
                trimmed,
                "wildcards are only allowed with == and !=",
            ));
        }

        let version = Version::parse(version_str)
            .ok_or_else(|| Error::invalid_specifier(trimmed, "invalid version"))?;

        if wildcard && version.is_local() {
            return Err(Error::invalid_specifier(
                trimmed,
                "wildcard versions cannot carry a local label",
            ));
        }
        if operator == Operator::Compatible && version.release().len() < 2 {
            return Err(Error::invalid_specifier(
                trimmed,
                "~= needs at least two release segments",
            ));
        }

        Ok(Self {
            version,
            operator,
            wildcard,
        })
    }

    /// The clause's operator.
    #[must_use]
    pub const fn operator(&self) -> Operator {
        self.operator
    }

    /// The clause's version.
    #[must_use]
    pub const fn version(&self) -> &Version {
        &self.version
    }

    /// Whether this is a `.*` prefix clause.
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Whether this clause names exactly one version.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        matches!(self.operator, Operator::Equal | Operator::ArbitraryEqual) && !self.wildcard
    }

    /// The set of versions admitted by this clause.
    #[must_use]
    pub fn ranges(&self) -> Ranges<Version> {
        let v = &self.version;
        match self.operator {
            Operator::Equal | Operator::NotEqual if self.wildcard => {
                let len = v.release().len();
                let prefix = Ranges::between(v.prefix_floor(len), v.prefix_ceiling(len));
                if self.operator == Operator::Equal {
                    prefix
                } else {
                    prefix.complement()
                }
            }
            Operator::Equal | Operator::ArbitraryEqual => Ranges::singleton(v.clone()),
            Operator::NotEqual => Ranges::singleton(v.clone()).complement(),
            Operator::GreaterThanEqual => Ranges::higher_than(v.clone()),
            Operator::GreaterThan => Ranges::strictly_higher_than(v.clone()),
            Operator::LessThanEqual => Ranges::lower_than(v.clone()),
            Operator::LessThan => {
                // `<1.5` does not admit `1.5a1` unless the bound is itself a pre-release.
                if v.is_prerelease() || v.post().is_some() || v.is_local() {
                    Ranges::strictly_lower_than(v.clone())
                } else {
                    Ranges::strictly_lower_than(v.prefix_floor(v.release().len()))
                }
            }
            Operator::Compatible => {
                let len = v.release().len();
                Ranges::higher_than(v.clone())
                    .intersection(&Ranges::strictly_lower_than(v.prefix_ceiling(len.saturating_sub(1))))
            }
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator, self.version)?;
        if self.wildcard {
            f.write_str(".*")?;
        }
        Ok(())
    }
}

impl FromStr for Clause {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A conjunction of version clauses.
///
/// The empty specifier admits every version.
#[derive(Clone)]
pub struct VersionSpecifiers {
    clauses: BTreeSet<Clause>,
    ranges: Ranges<Version>,
}

impl VersionSpecifiers {
    /// A specifier admitting every version.
    #[must_use]
    pub fn any() -> Self {
        Self {
            clauses: BTreeSet::new(),
            ranges: Ranges::full(),
        }
    }

    /// A specifier pinning exactly `version`.
    #[must_use]
    pub fn exact(version: Version) -> Self {
        Self::from_clauses([Clause::new(Operator::Equal, version)])
    }

    /// Build a specifier from clauses.
    #[must_use]
    pub fn from_clauses(clauses: impl IntoIterator<Item = Clause>) -> Self {
        let mut spec = Self::any();
        for clause in clauses {
            spec.ranges = spec.ranges.intersection(&clause.ranges());
            spec.clauses.insert(clause);
        }
        spec
    }

    /// Parse a comma-separated clause list. An empty string admits any
    /// version.
    ///
    /// ```
    /// use lockwright_core::{Version, VersionSpecifiers};
    ///
    /// let spec = VersionSpecifiers::parse(">=1.0, <2.0").unwrap();
    /// assert!(spec.contains(&Version::parse("1.5").unwrap()));
    /// assert_eq!(spec.to_string(), ">=1.0,<2.0");
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self::any());
        }
        let clauses = input
            .split(',')
            .map(Clause::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_clauses(clauses))
    }

    /// Iterate clauses in display order.
    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }

    /// The admitted version set.
    #[must_use]
    pub const fn ranges(&self) -> &Ranges<Version> {
        &self.ranges
    }

    /// Whether `version` satisfies every clause.
    #[must_use]
    pub fn contains(&self, version: &Version) -> bool {
        self.ranges.contains(version)
    }

    /// Conjunction of two specifiers.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut clauses = self.clauses.clone();
        clauses.extend(other.clauses.iter().cloned());
        Self {
            clauses,
            ranges: self.ranges.intersection(&other.ranges),
        }
    }

    /// Whether no version can satisfy this specifier.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Whether this specifier has no clauses.
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The single version this specifier pins, if any.
    ///
    /// Requires an `==`/`===` clause without wildcard whose version every
    /// other clause admits.
    #[must_use]
    pub fn exact_version(&self) -> Option<&Version> {
        self.clauses
            .iter()
            .filter(|clause| clause.is_exact())
            .map(Clause::version)
            .find(|version| self.ranges.contains(version))
    }

    /// Whether this specifier pins exactly one version.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.exact_version().is_some()
    }

    /// Whether any clause names a pre-release, which opts in to pre-release
    /// candidates.
    #[must_use]
    pub fn mentions_prerelease(&self) -> bool {
        self.clauses.iter().any(|c| c.version.is_prerelease())
    }
}

impl Default for VersionSpecifiers {
    fn default() -> Self {
        Self::any()
    }
}

impl PartialEq for VersionSpecifiers {
    fn eq(&self, other: &Self) -> bool {
        self.clauses == other.clauses
    }
}

impl Eq for VersionSpecifiers {}

impl Hash for VersionSpecifiers {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.clauses.hash(state);
    }
}

impl fmt::Debug for VersionSpecifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionSpecifiers({self})")
    }
}

impl fmt::Display for VersionSpecifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for clause in &self.clauses {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{clause}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for VersionSpecifiers {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for VersionSpecifiers {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionSpecifiers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
