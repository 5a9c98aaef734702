//! PEP 440 version handling.
//!
//! Supported forms:
//!
//! - Release segments of any length: `1`, `1.2`, `2017.2.0.1`
//! - Epochs: `1!2.0`
//! - Pre-releases: `1.0a1`, `1.0b2`, `1.0rc1` (with `alpha`, `beta`, `c`,
//!   `pre` and `preview` spellings)
//! - Post-releases: `1.0.post1`, `1.0-1`, `1.0rev2`
//! - Dev releases: `1.0.dev3`
//! - Local labels: `1.0+ubuntu.1`
//!
//! Ordering follows PEP 440; equality ignores trailing zero release segments
//! (`1.0 == 1.0.0`).

use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use crate::error::Error;

/// Cache for parsed versions to avoid repeated parsing.
static VERSION_CACHE: LazyLock<RwLock<ahash::AHashMap<Arc<str>, Version>>> =
    LazyLock::new(|| RwLock::new(ahash::AHashMap::with_capacity(1024)));

/// Maximum cache size before eviction.
const MAX_CACHE_SIZE: usize = 8192;

static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        ^\s*
        v?
        (?:(?P<epoch>[0-9]+)!)?
        (?P<release>[0-9]+(?:\.[0-9]+)*)
        (?:
            [-_.]?
            (?P<pre_l>alpha|a|beta|b|preview|pre|c|rc)
            [-_.]?
            (?P<pre_n>[0-9]+)?
        )?
        (?:
            (?:-(?P<post_n1>[0-9]+))
            |
            (?:[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>[0-9]+)?)
        )?
        (?:
            [-_.]?
            (?P<dev_l>dev)
            [-_.]?
            (?P<dev_n>[0-9]+)?
        )?
        (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
        \s*$
        ",
    )
    .expect("valid regex")
});

/// Pre-release phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrePhase {
    /// Alpha release (`a`).
    Alpha,
    /// Beta release (`b`).
    Beta,
    /// Release candidate (`rc`).
    Rc,
}

impl PrePhase {
    fn parse(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "a" | "alpha" => Some(Self::Alpha),
            "b" | "beta" => Some(Self::Beta),
            "rc" | "c" | "pre" | "preview" => Some(Self::Rc),
            _ => None,
        }
    }
}

impl fmt::Display for PrePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alpha => f.write_str("a"),
            Self::Beta => f.write_str("b"),
            Self::Rc => f.write_str("rc"),
        }
    }
}

/// One dot-separated segment of a local version label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocalSegment {
    /// Numeric segment (sorts after any text segment).
    Number(u64),
    /// Alphanumeric segment (lowercased).
    Text(Arc<str>),
}

impl PartialOrd for LocalSegment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LocalSegment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Number(_), Self::Text(_)) => Ordering::Greater,
            (Self::Text(_), Self::Number(_)) => Ordering::Less,
        }
    }
}

impl fmt::Display for LocalSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A PEP 440 version.
#[derive(Clone)]
pub struct Version {
    epoch: u64,
    release: SmallVec<[u64; 4]>,
    pre: Option<(PrePhase, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: SmallVec<[LocalSegment; 2]>,
}

/// Sort key for the pre-release slot.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
    /// `X.devN` with no pre or post part sorts before every pre-release of X.
    DevOnly,
    Pre(PrePhase, u64),
    Final,
}

impl Version {
    /// Create a final release from its release segments.
    ///
    /// # Panics
    ///
    /// Panics if `release` is empty.
    #[must_use]
    pub fn new(release: impl IntoIterator<Item = u64>) -> Self {
        let release: SmallVec<[u64; 4]> = release.into_iter().collect();
        assert!(!release.is_empty(), "release cannot be empty");
        Self {
            epoch: 0,
            release,
            pre: None,
            post: None,
            dev: None,
            local: SmallVec::new(),
        }
    }

    /// Parse a version string.
    ///
    /// ```
    /// use lockwright_core::Version;
    ///
    /// let v = Version::parse("1.0rc1").unwrap();
    /// assert!(v.is_prerelease());
    /// assert!(v < Version::parse("1.0").unwrap());
    /// ```
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        {
            let cache = VERSION_CACHE.read();
            if let Some(cached) = cache.get(input) {
                return Some(cached.clone());
            }
        }

        let result = Self::parse_uncached(input)?;

        {
            let mut cache = VERSION_CACHE.write();
            if cache.len() >= MAX_CACHE_SIZE {
                let keys: Vec<_> = cache.keys().take(MAX_CACHE_SIZE / 2).cloned().collect();
                tracing::trace!(evicted = keys.len(), "version cache eviction");
                for key in keys {
                    cache.remove(&key);
                }
            }
            cache.insert(Arc::from(input), result.clone());
        }

        Some(result)
    }

    fn parse_uncached(input: &str) -> Option<Self> {
        let caps = VERSION_REGEX.captures(input)?;

        let epoch = match caps.name("epoch") {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };

        let release = caps
            .name("release")?
            .as_str()
            .split('.')
            .map(str::parse)
            .collect::<Result<SmallVec<[u64; 4]>, _>>()
            .ok()?;

        let pre = match caps.name("pre_l") {
            Some(label) => {
                let phase = PrePhase::parse(label.as_str())?;
                let number = caps
                    .name("pre_n")
                    .map_or(Some(0), |m| m.as_str().parse().ok())?;
                Some((phase, number))
            }
            None => None,
        };

        let post = if let Some(m) = caps.name("post_n1") {
            Some(m.as_str().parse().ok()?)
        } else if caps.name("post_l").is_some() {
            Some(
                caps.name("post_n2")
                    .map_or(Some(0), |m| m.as_str().parse().ok())?,
            )
        } else {
            None
        };

        let dev = if caps.name("dev_l").is_some() {
            Some(
                caps.name("dev_n")
                    .map_or(Some(0), |m| m.as_str().parse().ok())?,
            )
        } else {
            None
        };

        let local = caps
            .name("local")
            .map(|m| {
                m.as_str()
                    .split(['-', '_', '.'])
                    .map(|segment| match segment.parse::<u64>() {
                        Ok(n) => LocalSegment::Number(n),
                        Err(_) => LocalSegment::Text(Arc::from(segment.to_ascii_lowercase())),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    /// Epoch (`N!` prefix), zero when absent.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Release segments exactly as written.
    #[must_use]
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    /// Pre-release phase and number.
    #[must_use]
    pub const fn pre(&self) -> Option<(PrePhase, u64)> {
        self.pre
    }

    /// Post-release number.
    #[must_use]
    pub const fn post(&self) -> Option<u64> {
        self.post
    }

    /// Dev-release number.
    #[must_use]
    pub const fn dev(&self) -> Option<u64> {
        self.dev
    }

    /// Whether this is a pre-release or dev release.
    #[must_use]
    #[inline]
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    /// Whether this version carries a local label.
    #[must_use]
    pub fn is_local(&self) -> bool {
        !self.local.is_empty()
    }

    /// Copy with a pre-release part.
    #[must_use]
    pub fn with_pre(mut self, phase: PrePhase, number: u64) -> Self {
        self.pre = Some((phase, number));
        self
    }

    /// Copy with a post-release part.
    #[must_use]
    pub fn with_post(mut self, number: u64) -> Self {
        self.post = Some(number);
        self
    }

    /// Copy with a dev-release part.
    #[must_use]
    pub fn with_dev(mut self, number: u64) -> Self {
        self.dev = Some(number);
        self
    }

    /// Copy with another epoch.
    #[must_use]
    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    /// Copy without the local label.
    #[must_use]
    pub fn without_local(&self) -> Self {
        let mut copy = self.clone();
        copy.local.clear();
        copy
    }

    /// The smallest version that starts with the first `len` release
    /// segments of `self` (`1.4.dev0` for `1.4.2` and `len == 2`).
    #[must_use]
    pub fn prefix_floor(&self, len: usize) -> Self {
        let mut release: SmallVec<[u64; 4]> = self.release.iter().copied().take(len).collect();
        while release.len() < len.max(1) {
            release.push(0);
        }
        Self::new(release).with_epoch(self.epoch).with_dev(0)
    }

    /// The smallest version past every version starting with the first `len`
    /// release segments of `self` (`1.5.dev0` for `1.4.2` and `len == 2`).
    #[must_use]
    pub fn prefix_ceiling(&self, len: usize) -> Self {
        let mut floor = self.prefix_floor(len);
        if let Some(last) = floor.release.last_mut() {
            *last = last.saturating_add(1);
        }
        floor
    }

    fn pre_key(&self) -> PreKey {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => PreKey::DevOnly,
            (Some((phase, n)), _, _) => PreKey::Pre(phase, n),
            (None, _, _) => PreKey::Final,
        }
    }

    /// Release segments without trailing zeros.
    fn significant_release(&self) -> &[u64] {
        let mut end = self.release.len();
        while end > 1 && self.release[end - 1] == 0 {
            end -= 1;
        }
        &self.release[..end]
    }
}

fn cmp_release(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }
    Ordering::Equal
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        self.significant_release().hash(state);
        self.pre.hash(state);
        self.post.hash(state);
        self.dev.hash(state);
        self.local.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| cmp_release(&self.release, &other.release))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post.cmp(&other.post))
            // No dev part sorts after any dev part.
            .then_with(|| match (self.dev, other.dev) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(&b),
            })
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({self})")
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let mut first = true;
        for segment in &self.release {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        if let Some((phase, n)) = self.pre {
            write!(f, "{phase}{n}")?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{n}")?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{n}")?;
        }
        if !self.local.is_empty() {
            f.write_str("+")?;
            let mut first = true;
            for segment in &self.local {
                if !first {
                    f.write_str(".")?;
                }
                write!(f, "{segment}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::invalid_version(s))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid version: {s}")))
    }
}

/// Clear the version cache.
pub fn clear_cache() {
    VERSION_CACHE.write().clear();
}
