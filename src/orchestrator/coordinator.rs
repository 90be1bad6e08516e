//! Concurrent multi-source search with a soft time budget.
//!
//! # Pipeline
//!
//! 1. Spawn one task per source, each bounded to the configured page size
//! 2. Race the combined calls against the time budget and the caller's
//!    cancellation token
//! 3. Snapshot the settled calls; unsettled ones are marked `Loading` and
//!    handed back in a [`RefreshToken`]
//! 4. Run one aggregation pass over the completed sources
//! 5. Collect each source's resume cursor into one [`ContinuationToken`],
//!    along with the sources that have delivered their last page
//!
//! A source whose call fails is logged and reported as `ErrorOccurred`; it
//! never fails the request. The time budget is not a cancellation: tasks
//! that miss it keep running and their results surface on refresh.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture, FutureExt};
use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::metadata::PackageSearchMetadata;
use crate::ranking::{PopularityRanker, Ranker, RankerKind};
use crate::source::{PackageSource, SourcePage};
use crate::token::{ContinuationToken, PendingSearch, RefreshToken, SourceOutcome};
use crate::types::{LoadingStatus, SearchFilter, SearchResult};

use super::aggregate::ResultAggregator;
use super::stream_merge::merge_package_streams;
use super::PackageFeed;

type SourceCall = BoxFuture<'static, Result<SourcePage, SearchError>>;

/// A feed that federates several package sources.
pub struct MultiSourceFeed {
    id: Uuid,
    sources: Vec<Arc<dyn PackageSource>>,
    config: SearchConfig,
    ranker: Arc<dyn Ranker>,
    blank_query_ranker: Arc<dyn Ranker>,
}

impl MultiSourceFeed {
    /// Create a feed over `sources`.
    ///
    /// Blank queries have nothing to score textually, so when the configured
    /// ranker is [`RankerKind::Relevance`] they are ranked by popularity.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the configuration is invalid, no
    /// source is given, or two sources share a name.
    pub fn new(
        sources: Vec<Arc<dyn PackageSource>>,
        config: SearchConfig,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        if sources.is_empty() {
            return Err(SearchError::Config(
                "at least one package source is required".into(),
            ));
        }
        let mut names = HashSet::new();
        for source in &sources {
            if !names.insert(source.name()) {
                return Err(SearchError::Config(format!(
                    "duplicate source name '{}'",
                    source.name()
                )));
            }
        }

        let ranker = config.ranker.build();
        let blank_query_ranker: Arc<dyn Ranker> = match config.ranker {
            RankerKind::Relevance => Arc::new(PopularityRanker),
            RankerKind::Popularity => Arc::clone(&ranker),
        };
        Ok(Self {
            id: Uuid::new_v4(),
            sources,
            config,
            ranker,
            blank_query_ranker,
        })
    }

    /// Replace the ranker used for non-blank queries.
    pub fn with_ranker(mut self, ranker: Arc<dyn Ranker>) -> Self {
        self.ranker = ranker;
        self
    }

    /// The instance id recorded in every token this feed issues.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The active configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Names of the configured sources, in configuration order.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    /// Enumerate every package whose id starts with `prefix` across all
    /// sources, in ascending id order, one spliced record per id.
    ///
    /// A source whose stream fails is logged and skipped from then on.
    pub fn list_all(
        &self,
        prefix: &str,
        filter: &SearchFilter,
    ) -> BoxStream<'static, Result<PackageSearchMetadata, SearchError>> {
        tracing::trace!(prefix, sources = self.sources.len(), "listing packages");
        merge_package_streams(
            self.sources
                .iter()
                .map(|source| source.list(prefix, filter))
                .collect(),
        )
    }

    fn source(&self, name: &str) -> Option<&Arc<dyn PackageSource>> {
        self.sources.iter().find(|source| source.name() == name)
    }

    fn ranker_for(&self, query: &str) -> Arc<dyn Ranker> {
        if query.trim().is_empty() {
            Arc::clone(&self.blank_query_ranker)
        } else {
            Arc::clone(&self.ranker)
        }
    }

    /// Wait for `searches` until they all settle, the time budget elapses,
    /// or `cancel` fires.
    async fn gather(
        &self,
        searches: &[(String, PendingSearch)],
        cancel: &CancellationToken,
    ) -> Result<(), SearchError> {
        let all = join_all(searches.iter().map(|(_, search)| search.settled()));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SearchError::Cancelled),
            outcome = tokio::time::timeout(self.config.timeout(), all) => {
                if outcome.is_err() {
                    tracing::debug!(
                        timeout_ms = self.config.timeout_ms,
                        "time budget elapsed with sources still loading"
                    );
                }
                Ok(())
            }
        }
    }

    /// Build the response from whatever has settled so far.
    ///
    /// `carried` names the sources an earlier page already exhausted.
    fn snapshot(
        &self,
        search_text: &str,
        filter: &SearchFilter,
        searches: Vec<(String, PendingSearch)>,
        carried: &BTreeSet<String>,
        cancel: &CancellationToken,
    ) -> Result<SearchResult<PackageSearchMetadata>, SearchError> {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let mut source_status = BTreeMap::new();
        let mut per_source = Vec::with_capacity(searches.len());
        let mut cursors = BTreeMap::new();
        let mut exhausted = carried.clone();
        let mut in_flight = false;

        for (name, search) in &searches {
            let status = match search.peek() {
                None => {
                    in_flight = true;
                    LoadingStatus::Loading
                }
                Some(SourceOutcome::Completed(page)) => {
                    match page.continuation {
                        Some(cursor) => {
                            cursors.insert(name.clone(), cursor);
                        }
                        None => {
                            exhausted.insert(name.clone());
                        }
                    }
                    per_source.push(page.items);
                    page.status
                }
                Some(SourceOutcome::Failed(_)) => LoadingStatus::ErrorOccurred,
                Some(SourceOutcome::Cancelled) => LoadingStatus::Cancelled,
            };
            source_status.insert(name.clone(), status);
        }
        // Sources not queried this round were either finished earlier or
        // never answered in time.
        for source in &self.sources {
            let name = source.name();
            if !source_status.contains_key(name) {
                let status = if exhausted.contains(name) {
                    LoadingStatus::NoMoreItems
                } else {
                    LoadingStatus::Unknown
                };
                source_status.insert(name.to_string(), status);
            }
        }

        let items = ResultAggregator::new(self.ranker_for(search_text)).aggregate(
            search_text,
            &per_source,
            cancel,
        )?;

        let next_token = (!cursors.is_empty()).then(|| ContinuationToken::Federated {
            feed: self.id,
            search_text: search_text.to_string(),
            filter: filter.clone(),
            cursors,
            exhausted,
        });
        let refresh_token = in_flight.then(|| RefreshToken {
            feed: self.id,
            search_text: search_text.to_string(),
            filter: filter.clone(),
            searches,
            exhausted: carried.clone(),
            retry_after: self.config.refresh_delay(),
        });

        Ok(SearchResult {
            items,
            source_status,
            next_token,
            refresh_token,
        })
    }

    async fn run(
        &self,
        search_text: &str,
        filter: &SearchFilter,
        calls: Vec<(String, SourceCall)>,
        carried: &BTreeSet<String>,
        cancel: &CancellationToken,
    ) -> Result<SearchResult<PackageSearchMetadata>, SearchError> {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        let searches: Vec<(String, PendingSearch)> = calls
            .into_iter()
            .map(|(name, call)| {
                let pending = spawn_search(name.clone(), call, cancel.child_token());
                (name, pending)
            })
            .collect();

        self.gather(&searches, cancel).await?;
        self.snapshot(search_text, filter, searches, carried, cancel)
    }
}

/// Run one source call on its own task.
///
/// The task publishes its outcome as soon as it settles; a panicking call
/// settles as [`SourceOutcome::Failed`]. Cancelling `cancel` drops the call.
fn spawn_search(name: String, call: SourceCall, cancel: CancellationToken) -> PendingSearch {
    let (outcome_tx, outcome_rx) = watch::channel(None);
    tokio::spawn(async move {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(source = %name, "source call cancelled");
                SourceOutcome::Cancelled
            }
            result = AssertUnwindSafe(call).catch_unwind() => match result {
                Ok(Ok(page)) => {
                    tracing::debug!(
                        source = %name,
                        count = page.items.len(),
                        status = %page.status,
                        "source returned results"
                    );
                    SourceOutcome::Completed(page)
                }
                Ok(Err(err)) => {
                    tracing::warn!(source = %name, error = %err, "source query failed");
                    SourceOutcome::Failed(err.to_string())
                }
                Err(_) => {
                    tracing::warn!(source = %name, "source task panicked");
                    SourceOutcome::Failed("source task panicked".into())
                }
            },
        };
        outcome_tx.send_replace(Some(outcome));
    });
    PendingSearch::new(outcome_rx)
}

#[async_trait]
impl PackageFeed for MultiSourceFeed {
    async fn search(
        &self,
        text: &str,
        filter: &SearchFilter,
        cancel: &CancellationToken,
    ) -> Result<SearchResult<PackageSearchMetadata>, SearchError> {
        tracing::trace!(query = text, sources = self.sources.len(), "federated search");
        let page_size = self.config.page_size;
        let calls = self
            .sources
            .iter()
            .map(|source| {
                let name = source.name().to_string();
                let source = Arc::clone(source);
                let text = text.to_string();
                let filter = filter.clone();
                let call: SourceCall =
                    async move { source.search(&text, &filter, page_size).await }.boxed();
                (name, call)
            })
            .collect();
        self.run(text, filter, calls, &BTreeSet::new(), cancel).await
    }

    async fn continue_search(
        &self,
        token: &ContinuationToken,
        cancel: &CancellationToken,
    ) -> Result<SearchResult<PackageSearchMetadata>, SearchError> {
        let (search_text, filter, cursors, exhausted) = match token {
            ContinuationToken::Federated {
                feed,
                search_text,
                filter,
                cursors,
                exhausted,
            } if *feed == self.id => (search_text, filter, cursors, exhausted),
            ContinuationToken::Federated { .. } => {
                return Err(SearchError::InvalidToken(
                    "continuation token was issued by another feed".into(),
                ))
            }
            ContinuationToken::Single { .. } => {
                return Err(SearchError::InvalidToken(
                    "single-source continuation token passed to a multi-source feed".into(),
                ))
            }
        };

        if let Some(name) = exhausted.iter().find(|name| self.source(name).is_none()) {
            return Err(SearchError::InvalidToken(format!(
                "continuation names unknown source '{name}'"
            )));
        }

        let page_size = self.config.page_size;
        let mut calls = Vec::with_capacity(cursors.len());
        for (name, cursor) in cursors {
            let source = self.source(name).ok_or_else(|| {
                SearchError::InvalidToken(format!("continuation names unknown source '{name}'"))
            })?;
            let source = Arc::clone(source);
            let cursor = cursor.clone();
            let call: SourceCall =
                async move { source.continue_search(&cursor, page_size).await }.boxed();
            calls.push((name.clone(), call));
        }

        tracing::trace!(query = %search_text, sources = calls.len(), "continuing search");
        self.run(search_text, filter, calls, exhausted, cancel).await
    }

    async fn refresh_search(
        &self,
        token: &RefreshToken,
        cancel: &CancellationToken,
    ) -> Result<SearchResult<PackageSearchMetadata>, SearchError> {
        if token.feed != self.id {
            return Err(SearchError::InvalidToken(
                "refresh token was issued by another feed".into(),
            ));
        }
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        tracing::trace!(
            query = %token.search_text,
            pending = ?token.pending_sources(),
            "refreshing search"
        );
        self.gather(&token.searches, cancel).await?;
        self.snapshot(
            &token.search_text,
            &token.filter,
            token.searches.clone(),
            &token.exhausted,
            cancel,
        )
    }
}

impl fmt::Debug for MultiSourceFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiSourceFeed")
            .field("id", &self.id)
            .field("sources", &self.source_names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
