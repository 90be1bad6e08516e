//! Search orchestrator: concurrent fan-out, ranking, merge and de-duplication.
//!
//! [`MultiSourceFeed`] queries every configured source concurrently under a
//! time budget, ranks the union of what came back, and merges the
//! per-source lists into one de-duplicated list. [`SingleSourceFeed`] is the
//! plain paging shape over one source. Both implement [`PackageFeed`].

pub mod aggregate;
pub mod coordinator;
pub mod single;
pub mod splice;
pub mod stream_merge;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::SearchError;
use crate::metadata::PackageSearchMetadata;
use crate::token::{ContinuationToken, RefreshToken};
use crate::types::{SearchFilter, SearchResult};

pub use aggregate::ResultAggregator;
pub use coordinator::MultiSourceFeed;
pub use single::SingleSourceFeed;

/// The search contract exposed to callers.
///
/// Every call takes a cancellation token. A cancelled call returns
/// [`SearchError::Cancelled`] and never a partial result.
#[async_trait]
pub trait PackageFeed: Send + Sync {
    /// Run a new search for `text`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Cancelled`] if `cancel` fires first.
    async fn search(
        &self,
        text: &str,
        filter: &SearchFilter,
        cancel: &CancellationToken,
    ) -> Result<SearchResult<PackageSearchMetadata>, SearchError>;

    /// Fetch the next page of an earlier search.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidToken`] if this feed did not issue
    /// `token` or the token has the wrong shape.
    async fn continue_search(
        &self,
        token: &ContinuationToken,
        cancel: &CancellationToken,
    ) -> Result<SearchResult<PackageSearchMetadata>, SearchError>;

    /// Take a fresh snapshot of a search that had sources still in flight.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidToken`] if this feed did not issue
    /// `token`.
    async fn refresh_search(
        &self,
        token: &RefreshToken,
        cancel: &CancellationToken,
    ) -> Result<SearchResult<PackageSearchMetadata>, SearchError>;
}
