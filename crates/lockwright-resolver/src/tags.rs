//! Target platform compatibility tags.
//!
//! Wheels encode the interpreters, ABIs and platforms they support in their
//! file names (`pkg-1.0-py2.py3-none-any.whl`). A [`TargetTags`] lists the
//! `(interpreter, abi, platform)` triples the environment accepts; an
//! artifact is compatible when any expanded triple of its name is listed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One `(interpreter, abi, platform)` triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Interpreter tag (`cp312`, `py3`).
    pub interpreter: String,
    /// ABI tag (`cp312`, `abi3`, `none`).
    pub abi: String,
    /// Platform tag (`manylinux_2_17_x86_64`, `any`).
    pub platform: String,
}

impl Tag {
    /// Create a tag; parts are lowercased.
    #[must_use]
    pub fn new(interpreter: &str, abi: &str, platform: &str) -> Self {
        Self {
            interpreter: interpreter.to_ascii_lowercase(),
            abi: abi.to_ascii_lowercase(),
            platform: platform.to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.interpreter, self.abi, self.platform)
    }
}

/// Kind of distribution artifact, judged by file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Built wheel.
    Wheel,
    /// Source distribution.
    Sdist,
    /// Anything else (eggs, installers).
    Other,
}

impl ArtifactKind {
    /// Classify an artifact file name.
    #[must_use]
    pub fn of(filename: &str) -> Self {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".whl") {
            Self::Wheel
        } else if [".tar.gz", ".zip", ".tar.bz2", ".tar.xz", ".tgz"]
            .iter()
            .any(|ext| lower.ends_with(ext))
        {
            Self::Sdist
        } else {
            Self::Other
        }
    }
}

/// Expand the compressed tag set of a wheel file name.
///
/// Returns `None` when the name is not a well-formed wheel name.
#[must_use]
pub fn wheel_tags(filename: &str) -> Option<BTreeSet<Tag>> {
    let stem = filename.strip_suffix(".whl")?;
    let parts: Vec<&str> = stem.split('-').collect();
    // name-version(-build)?-python-abi-platform
    if !(5..=6).contains(&parts.len()) {
        return None;
    }
    let [python, abi, platform] = &parts[parts.len() - 3..] else {
        return None;
    };

    let mut tags = BTreeSet::new();
    for interpreter in python.split('.') {
        for abi in abi.split('.') {
            for platform in platform.split('.') {
                tags.insert(Tag::new(interpreter, abi, platform));
            }
        }
    }
    Some(tags)
}

/// The set of tags an environment accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetTags {
    tags: Vec<Tag>,
}

impl TargetTags {
    /// Build from triples in priority order.
    #[must_use]
    pub fn new(tags: impl IntoIterator<Item = Tag>) -> Self {
        let mut seen = BTreeSet::new();
        let tags = tags
            .into_iter()
            .filter(|tag| seen.insert(tag.clone()))
            .collect();
        Self { tags }
    }

    /// Tags for a `CPython` `major.minor` interpreter on `platform`.
    #[must_use]
    pub fn cpython(major: u32, minor: u32, platform: &str) -> Self {
        let cp = format!("cp{major}{minor}");
        let py_major = format!("py{major}");
        let py_exact = format!("py{major}{minor}");
        let mut tags = vec![
            Tag::new(&cp, &cp, platform),
            Tag::new(&cp, "abi3", platform),
            Tag::new(&cp, "none", platform),
        ];
        // abi3 wheels built for older minors stay loadable.
        for older in (2..minor).rev() {
            tags.push(Tag::new(&format!("cp{major}{older}"), "abi3", platform));
        }
        tags.extend([
            Tag::new(&py_exact, "none", platform),
            Tag::new(&py_major, "none", platform),
            Tag::new(&cp, "none", "any"),
            Tag::new(&py_exact, "none", "any"),
            Tag::new(&py_major, "none", "any"),
        ]);
        Self::new(tags)
    }

    /// The triples in priority order.
    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Whether an artifact can be installed in this environment.
    ///
    /// Source distributions are always compatible; wheels must share at
    /// least one expanded tag; other artifact kinds never match.
    #[must_use]
    pub fn is_compatible(&self, filename: &str) -> bool {
        match ArtifactKind::of(filename) {
            ArtifactKind::Sdist => true,
            ArtifactKind::Other => false,
            ArtifactKind::Wheel => wheel_tags(filename)
                .is_some_and(|tags| self.tags.iter().any(|tag| tags.contains(tag))),
        }
    }
}

impl Default for TargetTags {
    /// Pure-Python wheels only.
    fn default() -> Self {
        Self::new([Tag::new("py3", "none", "any"), Tag::new("py2", "none", "any")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn expands_compressed_tags() {
        let tags = wheel_tags("six-1.16.0-py2.py3-none-any.whl").unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags.contains(&Tag::new("py2", "none", "any")));
        assert!(tags.contains(&Tag::new("py3", "none", "any")));
    }

    #[test]
    fn build_tag_is_skipped() {
        let tags = wheel_tags("pkg-1.0-1-cp312-cp312-manylinux_2_17_x86_64.whl").unwrap();
        assert_eq!(
            tags.into_iter().collect::<Vec<_>>(),
            vec![Tag::new("cp312", "cp312", "manylinux_2_17_x86_64")]
        );
    }

    #[test_case("pkg-1.0.tar.gz", true; "sdist")]
    #[test_case("pkg-1.0-py3-none-any.whl", true; "pure wheel")]
    #[test_case("pkg-1.0-cp312-abi3-manylinux_2_17_x86_64.whl", true; "abi3 wheel")]
    #[test_case("pkg-1.0-cp310-abi3-manylinux_2_17_x86_64.whl", true; "older abi3 wheel")]
    #[test_case("pkg-1.0-cp311-cp311-manylinux_2_17_x86_64.whl", false; "other interpreter")]
    #[test_case("pkg-1.0-cp312-cp312-win_amd64.whl", false; "other platform")]
    #[test_case("pkg-1.0-py2.7.egg", false; "egg")]
    #[test_case("broken.whl", false; "malformed wheel")]
    fn cpython_compatibility(filename: &str, expected: bool) {
        let target = TargetTags::cpython(3, 12, "manylinux_2_17_x86_64");
        assert_eq!(target.is_compatible(filename), expected);
    }

    #[test]
    fn default_accepts_pure_python_only() {
        let target = TargetTags::default();
        assert!(target.is_compatible("pkg-1.0-py2.py3-none-any.whl"));
        assert!(!target.is_compatible("pkg-1.0-cp312-cp312-win_amd64.whl"));
    }

    #[test]
    fn duplicate_tags_are_dropped() {
        let tag = Tag::new("py3", "none", "any");
        let target = TargetTags::new([tag.clone(), tag]);
        assert_eq!(target.tags().len(), 1);
    }
}
