//! The plain single-source query shape.
//!
//! Items come back in the source's own order; there is nothing to rank or
//! merge. The call is awaited to completion (or cancellation), so no
//! refresh token is ever issued.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::metadata::PackageSearchMetadata;
use crate::source::{PackageSource, SourcePage};
use crate::token::{ContinuationToken, RefreshToken};
use crate::types::{LoadingStatus, SearchFilter, SearchResult};

use super::PackageFeed;

/// A feed over exactly one source.
pub struct SingleSourceFeed {
    id: Uuid,
    source: Arc<dyn PackageSource>,
    config: SearchConfig,
}

impl SingleSourceFeed {
    /// Create a feed over `source`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the configuration is invalid.
    pub fn new(source: Arc<dyn PackageSource>, config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            source,
            config,
        })
    }

    /// The instance id recorded in every token this feed issues.
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn page_result(&self, outcome: Result<SourcePage, SearchError>) -> SearchResult<PackageSearchMetadata> {
        let name = self.source.name().to_string();
        match outcome {
            Ok(page) => {
                let mut source_status = BTreeMap::new();
                source_status.insert(name, page.status);
                SearchResult {
                    items: page.items,
                    source_status,
                    next_token: page.continuation.map(|cursor| ContinuationToken::Single {
                        feed: self.id,
                        cursor,
                    }),
                    refresh_token: None,
                }
            }
            Err(err) => {
                tracing::warn!(source = %name, error = %err, "source query failed");
                let mut result = SearchResult::empty();
                result.source_status.insert(name, LoadingStatus::ErrorOccurred);
                result
            }
        }
    }
}

#[async_trait]
impl PackageFeed for SingleSourceFeed {
    async fn search(
        &self,
        text: &str,
        filter: &SearchFilter,
        cancel: &CancellationToken,
    ) -> Result<SearchResult<PackageSearchMetadata>, SearchError> {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        tracing::trace!(query = text, source = self.source.name(), "single-source search");
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SearchError::Cancelled),
            outcome = self.source.search(text, filter, self.config.page_size) => outcome,
        };
        Ok(self.page_result(outcome))
    }

    async fn continue_search(
        &self,
        token: &ContinuationToken,
        cancel: &CancellationToken,
    ) -> Result<SearchResult<PackageSearchMetadata>, SearchError> {
        let cursor = match token {
            ContinuationToken::Single { feed, cursor } if *feed == self.id => cursor,
            ContinuationToken::Single { .. } => {
                return Err(SearchError::InvalidToken(
                    "continuation token was issued by another feed".into(),
                ))
            }
            ContinuationToken::Federated { .. } => {
                return Err(SearchError::InvalidToken(
                    "federated continuation token passed to a single-source feed".into(),
                ))
            }
        };
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SearchError::Cancelled),
            outcome = self.source.continue_search(cursor, self.config.page_size) => outcome,
        };
        Ok(self.page_result(outcome))
    }

    async fn refresh_search(
        &self,
        _token: &RefreshToken,
        _cancel: &CancellationToken,
    ) -> Result<SearchResult<PackageSearchMetadata>, SearchError> {
        Err(SearchError::InvalidToken(
            "single-source feeds do not issue refresh tokens".into(),
        ))
    }
}
