//! Comparable package versions.
//!
//! [`PackageVersion`] accepts the lenient version strings package feeds
//! publish (`1.0`, `2.1.3.4`, `1.0.0-Beta.2+sha.abc`) and orders them by
//! semantic-version precedence. The engine only ever uses it as an opaque,
//! totally ordered, hashable key.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use semver::Prerelease;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// A package version with semantic-version precedence.
///
/// Build metadata is accepted but ignored for ordering and equality.
/// Prerelease labels compare case-insensitively, and a release sorts above
/// any prerelease of the same numeric version.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageVersion {
    major: u64,
    minor: u64,
    patch: u64,
    revision: u64,
    pre: Prerelease,
    original: String,
}

impl PackageVersion {
    /// Construct a release version `major.minor.patch`.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            revision: 0,
            pre: Prerelease::EMPTY,
            original: format!("{major}.{minor}.{patch}"),
        }
    }

    /// Parse a version string.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidVersion`] if the numeric part has more
    /// than four components, a component is not a number, or the prerelease
    /// label is malformed.
    pub fn parse(raw: &str) -> Result<Self, SearchError> {
        let trimmed = raw.trim();
        let invalid = || SearchError::InvalidVersion(raw.to_string());

        let without_meta = trimmed.split_once('+').map_or(trimmed, |(v, _)| v);
        let (numeric, pre) = match without_meta.split_once('-') {
            Some((numeric, pre)) => (numeric, Some(pre)),
            None => (without_meta, None),
        };

        let parts: Vec<&str> = numeric.split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(invalid());
        }
        let mut components = [0u64; 4];
        for (slot, part) in components.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| invalid())?;
        }

        let pre = match pre {
            Some(label) => Prerelease::new(&label.to_ascii_lowercase()).map_err(|_| invalid())?,
            None => Prerelease::EMPTY,
        };
        if pre.is_empty() && without_meta.ends_with('-') {
            return Err(invalid());
        }

        Ok(Self {
            major: components[0],
            minor: components[1],
            patch: components[2],
            revision: components[3],
            pre,
            original: trimmed.to_string(),
        })
    }

    /// Whether this version carries a prerelease label.
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// The string this version was parsed from.
    pub fn original(&self) -> &str {
        &self.original
    }

    fn numeric(&self) -> (u64, u64, u64, u64) {
        (self.major, self.minor, self.patch, self.revision)
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.numeric()
            .cmp(&other.numeric())
            .then_with(|| self.pre.cmp(&other.pre))
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl Hash for PackageVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.numeric().hash(state);
        self.pre.hash(state);
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.revision > 0 {
            write!(f, ".{}", self.revision)?;
        }
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre)?;
        }
        Ok(())
    }
}

impl fmt::Debug for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageVersion({self})")
    }
}

impl FromStr for PackageVersion {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PackageVersion {
    type Error = SearchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PackageVersion> for String {
    fn from(value: PackageVersion) -> Self {
        value.original
    }
}
