//! In-memory package catalogue source.
//!
//! [`CatalogSource`] serves search, paging and enumeration over a fixed list
//! of packages, either built in code or loaded from a JSON document. It is
//! the local-folder style source and the reference implementation of
//! [`PackageSource`].

use std::path::Path;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::metadata::PackageSearchMetadata;
use crate::source::{PackageSource, SourcePage};
use crate::token::SourceCursor;
use crate::types::{IdKey, PackageIdentity, SearchFilter, VersionInfo};
use crate::version::PackageVersion;

/// One published version of a catalogue package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogVersion {
    /// The version.
    pub version: PackageVersion,
    /// Downloads of this version.
    #[serde(default)]
    pub downloads: Option<u64>,
    /// Whether the version is listed.
    #[serde(default = "listed_default")]
    pub listed: bool,
}

fn listed_default() -> bool {
    true
}

/// A package in the catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Package id.
    pub id: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Short summary.
    #[serde(default)]
    pub summary: String,
    /// Long description.
    #[serde(default)]
    pub description: String,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Authors.
    #[serde(default)]
    pub authors: Vec<String>,
    /// Published versions.
    pub versions: Vec<CatalogVersion>,
}

impl CatalogEntry {
    /// Create an entry with listed versions and their download counts.
    pub fn new(id: impl Into<String>, versions: Vec<(PackageVersion, Option<u64>)>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            summary: String::new(),
            description: String::new(),
            tags: Vec::new(),
            authors: Vec::new(),
            versions: versions
                .into_iter()
                .map(|(version, downloads)| CatalogVersion {
                    version,
                    downloads,
                    listed: true,
                })
                .collect(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the tags.
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| (*t).to_string()).collect();
        self
    }

    fn matches(&self, terms: &[String]) -> bool {
        if terms.is_empty() {
            return true;
        }
        let haystack = format!(
            "{} {} {} {} {}",
            self.id,
            self.title,
            self.summary,
            self.description,
            self.tags.join(" ")
        )
        .to_lowercase();
        terms.iter().all(|term| haystack.contains(term.as_str()))
    }

    /// Project the entry through `filter`; `None` when no version survives.
    fn to_metadata(&self, filter: &SearchFilter) -> Option<PackageSearchMetadata> {
        let visible: Vec<&CatalogVersion> = self
            .versions
            .iter()
            .filter(|v| filter.include_prerelease || !v.version.is_prerelease())
            .filter(|v| filter.include_delisted || v.listed)
            .collect();
        let latest = visible.iter().map(|v| &v.version).max()?.clone();

        let download_count = visible
            .iter()
            .filter_map(|v| v.downloads)
            .reduce(|a, b| a.saturating_add(b));
        let versions = visible
            .iter()
            .map(|v| VersionInfo::new(v.version.clone(), v.downloads))
            .collect();

        Some(
            PackageSearchMetadata::new(PackageIdentity::new(self.id.clone(), latest))
                .with_title(if self.title.is_empty() {
                    self.id.clone()
                } else {
                    self.title.clone()
                })
                .with_summary(self.summary.clone())
                .with_description(self.description.clone())
                .with_tags(self.tags.clone())
                .with_authors(self.authors.clone())
                .with_download_count(download_count)
                .with_versions(versions),
        )
    }
}

/// A package source backed by an in-memory catalogue.
#[derive(Debug, Clone)]
pub struct CatalogSource {
    name: String,
    entries: Vec<CatalogEntry>,
}

impl CatalogSource {
    /// Create a source named `name` serving `entries` in the given order.
    pub fn new(name: impl Into<String>, entries: Vec<CatalogEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    /// Parse a JSON array of [`CatalogEntry`] values.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Parse`] if the document is not a valid catalogue.
    pub fn from_json_str(name: impl Into<String>, json: &str) -> Result<Self, SearchError> {
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(json).map_err(|e| SearchError::Parse(e.to_string()))?;
        Ok(Self::new(name, entries))
    }

    /// Load a JSON catalogue from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(name: impl Into<String>, path: &Path) -> Result<Self, SearchError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(name, &content)
    }

    /// Number of packages in the catalogue.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalogue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn page(
        &self,
        text: &str,
        filter: &SearchFilter,
        start_index: usize,
        page_size: usize,
    ) -> SourcePage {
        let terms: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
        let mut matches = self
            .entries
            .iter()
            .filter(|entry| entry.matches(&terms))
            .filter_map(|entry| entry.to_metadata(filter))
            .skip(start_index);

        let items: Vec<PackageSearchMetadata> = matches.by_ref().take(page_size).collect();
        let has_more = matches.next().is_some();
        let continuation =
            has_more.then(|| SourceCursor::after(text, filter, start_index, items.len()));
        SourcePage::new(items, continuation, start_index == 0)
    }
}

#[async_trait]
impl PackageSource for CatalogSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        text: &str,
        filter: &SearchFilter,
        page_size: usize,
    ) -> Result<SourcePage, SearchError> {
        tracing::trace!(source = %self.name, query = text, "catalogue search");
        Ok(self.page(text, filter, 0, page_size))
    }

    async fn continue_search(
        &self,
        cursor: &SourceCursor,
        page_size: usize,
    ) -> Result<SourcePage, SearchError> {
        Ok(self.page(
            &cursor.search_text,
            &cursor.filter,
            cursor.start_index,
            page_size,
        ))
    }

    fn list(
        &self,
        prefix: &str,
        filter: &SearchFilter,
    ) -> BoxStream<'static, Result<PackageSearchMetadata, SearchError>> {
        let prefix = prefix.to_lowercase();
        let mut listed: Vec<PackageSearchMetadata> = self
            .entries
            .iter()
            .filter(|entry| IdKey::new(&entry.id).as_str().starts_with(&prefix))
            .filter_map(|entry| entry.to_metadata(filter))
            .collect();
        listed.sort_by_key(PackageSearchMetadata::id_key);
        stream::iter(listed.into_iter().map(Ok)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LoadingStatus;

    fn v(raw: &str) -> PackageVersion {
        PackageVersion::parse(raw).expect("valid version")
    }

    fn catalogue() -> CatalogSource {
        CatalogSource::new(
            "local",
            vec![
                CatalogEntry::new("Newtonsoft.Json", vec![(v("12.0.3"), Some(10)), (v("13.0.1"), Some(20))])
                    .with_description("Popular high-performance JSON framework")
                    .with_tags(&["json"]),
                CatalogEntry::new("Serilog", vec![(v("3.0.0"), Some(5)), (v("4.0.0-dev"), Some(1))]),
                CatalogEntry::new("System.Text.Json", vec![(v("8.0.0"), None)])
                    .with_tags(&["json", "serialization"]),
            ],
        )
    }

    #[tokio::test]
    async fn search_matches_terms_case_insensitively() {
        let page = catalogue()
            .search("JSON", &SearchFilter::default(), 10)
            .await
            .expect("search");
        let ids: Vec<&str> = page.items.iter().map(|m| m.identity.id.as_str()).collect();
        assert_eq!(ids, vec!["Newtonsoft.Json", "System.Text.Json"]);
        assert_eq!(page.status, LoadingStatus::NoMoreItems);
    }

    #[tokio::test]
    async fn identity_is_latest_visible_version() {
        let source = catalogue();
        let stable = source
            .search("serilog", &SearchFilter::default(), 10)
            .await
            .expect("search");
        assert_eq!(stable.items[0].identity.version, v("3.0.0"));

        let filter = SearchFilter {
            include_prerelease: true,
            ..Default::default()
        };
        let pre = source.search("serilog", &filter, 10).await.expect("search");
        assert_eq!(pre.items[0].identity.version, v("4.0.0-dev"));
        assert_eq!(pre.items[0].download_count, Some(6));
        assert_eq!(pre.items[0].versions().await.len(), 2);
    }

    #[tokio::test]
    async fn delisted_versions_hidden_by_default() {
        let mut entry = CatalogEntry::new("Old.Package", vec![(v("1.0.0"), Some(1))]);
        entry.versions[0].listed = false;
        let source = CatalogSource::new("local", vec![entry]);

        let page = source
            .search("", &SearchFilter::default(), 10)
            .await
            .expect("search");
        assert_eq!(page.status, LoadingStatus::NoItemsFound);

        let filter = SearchFilter {
            include_delisted: true,
            ..Default::default()
        };
        let page = source.search("", &filter, 10).await.expect("search");
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn paging_with_cursor() {
        let source = catalogue();
        let first = source
            .search("", &SearchFilter::default(), 2)
            .await
            .expect("search");
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.status, LoadingStatus::Ready);

        let cursor = first.continuation.expect("more pages");
        assert_eq!(cursor.start_index, 2);
        let second = source.continue_search(&cursor, 2).await.expect("page");
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].identity.id, "System.Text.Json");
        assert!(second.continuation.is_none());
        assert_eq!(second.status, LoadingStatus::NoMoreItems);
    }

    #[tokio::test]
    async fn list_is_sorted_by_id_and_prefix_filtered() {
        let source = CatalogSource::new(
            "local",
            vec![
                CatalogEntry::new("zeta", vec![(v("1.0"), None)]),
                CatalogEntry::new("Alpha", vec![(v("1.0"), None)]),
                CatalogEntry::new("alphabet", vec![(v("1.0"), None)]),
            ],
        );
        let all: Vec<String> = source
            .list("", &SearchFilter::default())
            .map(|r| r.expect("item").identity.id)
            .collect()
            .await;
        assert_eq!(all, vec!["Alpha", "alphabet", "zeta"]);

        let prefixed: Vec<String> = source
            .list("ALPHA", &SearchFilter::default())
            .map(|r| r.expect("item").identity.id)
            .collect()
            .await;
        assert_eq!(prefixed, vec!["Alpha", "alphabet"]);
    }

    #[test]
    fn json_catalogue_round_trip_through_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("catalogue.json");
        std::fs::write(
            &path,
            r#"[{"id": "Dapper", "tags": ["orm"], "versions": [{"version": "2.1.0", "downloads": 7}]}]"#,
        )
        .expect("write");

        let source = CatalogSource::from_json_file("disk", &path).expect("load");
        assert_eq!(source.len(), 1);
        assert_eq!(source.name(), "disk");
        assert!(source.entries[0].versions[0].listed);
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = CatalogSource::from_json_str("bad", "{not json").unwrap_err();
        assert!(err.to_string().starts_with("parse error"));
    }
}
