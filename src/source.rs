//! Trait definition for pluggable package sources.
//!
//! A [`PackageSource`] is the client of one package repository. The
//! orchestrator queries every configured source concurrently, so all
//! implementations must be `Send + Sync`.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::SearchError;
use crate::metadata::PackageSearchMetadata;
use crate::token::SourceCursor;
use crate::types::{LoadingStatus, SearchFilter};

/// One page of results from one source.
#[derive(Debug, Clone)]
pub struct SourcePage {
    /// Items in the source's own order.
    pub items: Vec<PackageSearchMetadata>,
    /// Status the source reports for this page.
    pub status: LoadingStatus,
    /// Where the next page starts, if there is one.
    pub continuation: Option<SourceCursor>,
}

impl SourcePage {
    /// Build a page, deriving the status from its contents.
    ///
    /// An empty first page is `NoItemsFound`, a page with a continuation is
    /// `Ready`, anything else is `NoMoreItems`.
    pub fn new(
        items: Vec<PackageSearchMetadata>,
        continuation: Option<SourceCursor>,
        first_page: bool,
    ) -> Self {
        let status = if continuation.is_some() {
            LoadingStatus::Ready
        } else if items.is_empty() && first_page {
            LoadingStatus::NoItemsFound
        } else {
            LoadingStatus::NoMoreItems
        };
        Self {
            items,
            status,
            continuation,
        }
    }
}

/// A pluggable package source.
///
/// Implementors handle their own transport, retries and paging. A returned
/// error is treated by the coordinator as a fault of this source alone.
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Stable name of this source, unique within a feed.
    fn name(&self) -> &str;

    /// Search for `text`, returning at most `page_size` items.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the source cannot be queried.
    async fn search(
        &self,
        text: &str,
        filter: &SearchFilter,
        page_size: usize,
    ) -> Result<SourcePage, SearchError>;

    /// Fetch the page starting at `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the source cannot be queried.
    async fn continue_search(
        &self,
        cursor: &SourceCursor,
        page_size: usize,
    ) -> Result<SourcePage, SearchError>;

    /// Enumerate every package whose id starts with `prefix`, in ascending
    /// id order.
    fn list(
        &self,
        prefix: &str,
        filter: &SearchFilter,
    ) -> BoxStream<'static, Result<PackageSearchMetadata, SearchError>>;
}
