//! Core value types shared by sources, rankers and the orchestrator.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::token::{ContinuationToken, RefreshToken};
use crate::version::PackageVersion;

/// Case-insensitive package id key.
///
/// This is the explicit key extracted from a package id for every
/// identity comparison, grouping and de-duplication in the crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdKey(String);

impl IdKey {
    /// Build the key for a package id.
    pub fn new(id: &str) -> Self {
        Self(id.to_lowercase())
    }

    /// The case-folded id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compare two id keys in ascending order.
pub fn compare_ids(a: &IdKey, b: &IdKey) -> Ordering {
    a.cmp(b)
}

/// The total order over identities: id key ascending, then version ascending.
pub fn compare_identities(a: &PackageIdentity, b: &PackageIdentity) -> Ordering {
    compare_ids(&a.id_key(), &b.id_key()).then_with(|| a.version.cmp(&b.version))
}

/// A package id plus version.
#[derive(Clone, Serialize, Deserialize)]
pub struct PackageIdentity {
    /// Package id as published by the source (original casing).
    pub id: String,
    /// Package version.
    pub version: PackageVersion,
}

impl PackageIdentity {
    /// Create an identity.
    pub fn new(id: impl Into<String>, version: PackageVersion) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// Extract the case-insensitive id key.
    pub fn id_key(&self) -> IdKey {
        IdKey::new(&self.id)
    }

    /// Whether both identities name the same package, ignoring version.
    pub fn same_id(&self, other: &Self) -> bool {
        self.id_key() == other.id_key()
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        compare_identities(self, other) == Ordering::Equal
    }
}

impl Eq for PackageIdentity {}

impl fmt::Debug for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// One entry of a package's version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// The version.
    pub version: PackageVersion,
    /// Downloads of this version, if the source reports them.
    pub download_count: Option<u64>,
}

impl VersionInfo {
    /// Create a version entry.
    pub fn new(version: PackageVersion, download_count: Option<u64>) -> Self {
        Self {
            version,
            download_count,
        }
    }
}

/// Normalise a version list: unique by version, keeping the maximum
/// observed download count per version, sorted ascending.
pub fn union_versions(lists: impl IntoIterator<Item = VersionInfo>) -> Vec<VersionInfo> {
    let mut merged: BTreeMap<PackageVersion, Option<u64>> = BTreeMap::new();
    for info in lists {
        merged
            .entry(info.version)
            .and_modify(|count| *count = (*count).max(info.download_count))
            .or_insert(info.download_count);
    }
    merged
        .into_iter()
        .map(|(version, download_count)| VersionInfo::new(version, download_count))
        .collect()
}

/// Per-source completion state attached to a result batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadingStatus {
    /// The source has not been heard from yet.
    Unknown,
    /// The source call is still in flight.
    Loading,
    /// A page was delivered and the source has more pages.
    Ready,
    /// The source has no further pages.
    NoMoreItems,
    /// The source matched nothing.
    NoItemsFound,
    /// The source call was cancelled.
    Cancelled,
    /// The source call failed.
    ErrorOccurred,
}

impl fmt::Display for LoadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "Unknown",
            Self::Loading => "Loading",
            Self::Ready => "Ready",
            Self::NoMoreItems => "NoMoreItems",
            Self::NoItemsFound => "NoItemsFound",
            Self::Cancelled => "Cancelled",
            Self::ErrorOccurred => "ErrorOccurred",
        };
        f.write_str(name)
    }
}

/// Filter passed through to every source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilter {
    /// Include prerelease versions.
    pub include_prerelease: bool,
    /// Include unlisted (delisted) versions.
    pub include_delisted: bool,
}

/// An ordered page of items plus per-source status and resume handles.
#[derive(Debug)]
pub struct SearchResult<T> {
    /// Items in final order.
    pub items: Vec<T>,
    /// Status per source name.
    pub source_status: BTreeMap<String, LoadingStatus>,
    /// Resume paging with this token.
    pub next_token: Option<ContinuationToken>,
    /// Re-poll slow sources with this token.
    pub refresh_token: Option<RefreshToken>,
}

impl<T> SearchResult<T> {
    /// A result with no items and no tokens.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            source_status: BTreeMap::new(),
            next_token: None,
            refresh_token: None,
        }
    }

    /// Fold the per-source statuses into one status.
    ///
    /// `Loading` wins over everything, then `Ready`. `ErrorOccurred` is only
    /// reported when every source errored.
    pub fn overall_status(&self) -> LoadingStatus {
        let statuses: Vec<LoadingStatus> = self.source_status.values().copied().collect();
        if statuses.is_empty() {
            return LoadingStatus::Unknown;
        }
        let any = |s: LoadingStatus| statuses.contains(&s);
        if any(LoadingStatus::Loading) {
            LoadingStatus::Loading
        } else if any(LoadingStatus::Ready) {
            LoadingStatus::Ready
        } else if statuses.iter().all(|s| *s == LoadingStatus::ErrorOccurred) {
            LoadingStatus::ErrorOccurred
        } else if any(LoadingStatus::Cancelled) {
            LoadingStatus::Cancelled
        } else if any(LoadingStatus::NoMoreItems) {
            LoadingStatus::NoMoreItems
        } else if any(LoadingStatus::NoItemsFound) {
            LoadingStatus::NoItemsFound
        } else {
            LoadingStatus::Unknown
        }
    }

    /// Whether any source is still in flight.
    pub fn is_loading(&self) -> bool {
        self.source_status.values().any(|s| *s == LoadingStatus::Loading)
    }
}
