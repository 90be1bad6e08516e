//! Package search metadata with a lazily computed version history.
//!
//! The version list of a [`PackageSearchMetadata`] is produced by an
//! asynchronous factory that only runs when [`PackageSearchMetadata::versions`]
//! is first awaited. The factory is wrapped in a [`Shared`] future, so however
//! many clones of the record await it, concurrently or not, the factory is
//! evaluated exactly once and every caller observes the same memoised list.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::types::{union_versions, IdKey, PackageIdentity, VersionInfo};

/// Memoised, normalised version list.
pub type Versions = Arc<[VersionInfo]>;

type VersionFuture = Shared<BoxFuture<'static, Versions>>;

/// Search metadata for one package as seen by one or more sources.
#[derive(Clone)]
pub struct PackageSearchMetadata {
    /// Identity of the record (normally the latest matching version).
    pub identity: PackageIdentity,
    /// Display title.
    pub title: String,
    /// Short summary.
    pub summary: String,
    /// Long description.
    pub description: String,
    /// Tags.
    pub tags: Vec<String>,
    /// Authors.
    pub authors: Vec<String>,
    /// Total downloads, if known.
    pub download_count: Option<u64>,
    versions: VersionFuture,
}

impl PackageSearchMetadata {
    /// Create a record whose version history is just its own identity.
    pub fn new(identity: PackageIdentity) -> Self {
        let own = vec![VersionInfo::new(identity.version.clone(), None)];
        Self {
            identity,
            title: String::new(),
            summary: String::new(),
            description: String::new(),
            tags: Vec::new(),
            authors: Vec::new(),
            download_count: None,
            versions: ready_versions(own),
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the authors.
    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    /// Set the total download count.
    pub fn with_download_count(mut self, download_count: Option<u64>) -> Self {
        self.download_count = download_count;
        self
    }

    /// Use an already known version list.
    pub fn with_versions(mut self, versions: Vec<VersionInfo>) -> Self {
        self.versions = ready_versions(versions);
        self
    }

    /// Use an asynchronous factory for the version list.
    ///
    /// The factory is not polled until [`versions`](Self::versions) is
    /// awaited, and is polled to completion at most once.
    pub fn with_version_factory<F>(mut self, factory: F) -> Self
    where
        F: Future<Output = Vec<VersionInfo>> + Send + 'static,
    {
        self.versions = lazy_versions(factory);
        self
    }

    /// The case-insensitive id key of this record.
    pub fn id_key(&self) -> IdKey {
        self.identity.id_key()
    }

    /// Await the version history: unique by version, ascending.
    pub async fn versions(&self) -> Versions {
        self.versions.clone().await
    }

    /// The version list if it has already been computed.
    pub fn versions_if_ready(&self) -> Option<Versions> {
        self.versions.peek().cloned()
    }
}

impl fmt::Debug for PackageSearchMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageSearchMetadata")
            .field("identity", &self.identity)
            .field("title", &self.title)
            .field("download_count", &self.download_count)
            .field("versions_ready", &self.versions.peek().is_some())
            .finish_non_exhaustive()
    }
}

fn ready_versions(versions: Vec<VersionInfo>) -> VersionFuture {
    let normalised: Versions = union_versions(versions).into();
    futures::future::ready(normalised).boxed().shared()
}

pub(crate) fn lazy_versions<F>(factory: F) -> VersionFuture
where
    F: Future<Output = Vec<VersionInfo>> + Send + 'static,
{
    async move {
        let versions: Versions = union_versions(factory.await).into();
        versions
    }
    .boxed()
    .shared()
}
