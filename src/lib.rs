//! # package-feed-search
//!
//! Federated package search across several independent package sources.
//!
//! A query is fanned out to every configured [`PackageSource`] concurrently.
//! Whatever comes back within the time budget is ranked once as a union,
//! merged into one ordered list, and de-duplicated by case-insensitive
//! package id, splicing the version histories of records that more than one
//! source returned. Sources that miss the budget are handed back in a
//! [`RefreshToken`]; paging resumes every source at its own position through
//! a [`ContinuationToken`].
//!
//! ## Design
//!
//! - One task per source, raced against a soft deadline
//! - A failing source is logged and reported per source; it never fails the call
//! - Relevance ranking over an ephemeral inverted index, popularity fallback
//! - Spliced version lists are computed lazily and exactly once
//! - Id-ordered enumeration across sources holds only one head per source
//!
//! Search queries are logged only at trace level.

pub mod config;
pub mod error;
pub mod metadata;
pub mod orchestrator;
pub mod ranking;
pub mod source;
pub mod sources;
pub mod token;
pub mod types;
pub mod version;

pub use config::SearchConfig;
pub use error::{Result, SearchError};
pub use metadata::PackageSearchMetadata;
pub use orchestrator::{MultiSourceFeed, PackageFeed, SingleSourceFeed};
pub use ranking::{PopularityRanker, Ranker, RankerKind, Ranking, RelevanceRanker};
pub use source::{PackageSource, SourcePage};
pub use token::{ContinuationToken, RefreshToken, SourceCursor};
pub use types::{IdKey, LoadingStatus, PackageIdentity, SearchFilter, SearchResult, VersionInfo};
pub use version::PackageVersion;

pub use tokio_util::sync::CancellationToken;

use std::sync::Arc;

/// Search `sources` once with the given configuration.
///
/// Convenience wrapper that builds a [`MultiSourceFeed`] and runs a single
/// search with a fresh cancellation token.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if the configuration or source list is
/// invalid. Individual source failures are reported through
/// [`SearchResult::source_status`], not as errors.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> package_feed_search::Result<()> {
/// use std::sync::Arc;
/// use package_feed_search::sources::{CatalogEntry, CatalogSource};
/// use package_feed_search::{PackageSource, PackageVersion, SearchConfig};
///
/// let local: Arc<dyn PackageSource> = Arc::new(CatalogSource::new(
///     "local",
///     vec![CatalogEntry::new("Newtonsoft.Json", vec![(PackageVersion::parse("13.0.1")?, Some(10))])],
/// ));
/// let result = package_feed_search::search(vec![local], "json", &SearchConfig::default()).await?;
/// for item in &result.items {
///     println!("{}", item.identity);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn search(
    sources: Vec<Arc<dyn PackageSource>>,
    text: &str,
    config: &SearchConfig,
) -> Result<SearchResult<PackageSearchMetadata>> {
    let feed = MultiSourceFeed::new(sources, config.clone())?;
    feed.search(text, &config.filter, &CancellationToken::new())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_validates_config_zero_page_size() {
        let config = SearchConfig {
            page_size: 0,
            ..Default::default()
        };
        let result = search(vec![], "test", &config).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("page_size"));
    }

    #[tokio::test]
    async fn search_requires_a_source() {
        let result = search(vec![], "test", &SearchConfig::default()).await;
        assert!(result.unwrap_err().to_string().contains("source"));
    }
}
