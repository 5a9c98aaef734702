//! Canonical package names.
//!
//! Names are normalized the way Python package indexes compare them: lowercase,
//! with every run of `-`, `_` and `.` collapsed to a single `-`. Two names that
//! normalize to the same string refer to the same project.

use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A normalized package name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName(Arc<str>);

impl PackageName {
    /// Parse and normalize a package name.
    ///
    /// Returns `None` if the name is empty, starts or ends with a separator,
    /// or contains characters outside `[A-Za-z0-9._-]`.
    ///
    /// ```
    /// use lockwright_core::PackageName;
    ///
    /// let name = PackageName::parse("Small_Fake.A").unwrap();
    /// assert_eq!(name.as_str(), "small-fake-a");
    /// ```
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let first = input.chars().next()?;
        let last = input.chars().last()?;
        if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
            return None;
        }

        let mut normalized = String::with_capacity(input.len());
        let mut in_separator = false;
        for ch in input.chars() {
            match ch {
                '-' | '_' | '.' => {
                    if !in_separator {
                        normalized.push('-');
                        in_separator = true;
                    }
                }
                c if c.is_ascii_alphanumeric() => {
                    normalized.push(c.to_ascii_lowercase());
                    in_separator = false;
                }
                _ => return None,
            }
        }

        Some(Self(Arc::from(normalized)))
    }

    /// Get the normalized name.
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PackageName").field(&self.0).finish()
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for PackageName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::invalid_name(s))
    }
}

impl Serialize for PackageName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PackageName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid package name: {s}")))
    }
}
