//! Continuation and refresh tokens.
//!
//! Tokens are opaque in-process handles. Each records the feed instance that
//! produced it so a feed can reject tokens it did not issue.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use crate::source::SourcePage;
use crate::types::SearchFilter;

/// A single source's resume position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCursor {
    /// Original query text.
    pub search_text: String,
    /// Filter the query was issued with.
    pub filter: SearchFilter,
    /// Index of the first item of the next page.
    pub start_index: usize,
}

impl SourceCursor {
    /// Cursor for the page after one of `len` items starting at `start_index`.
    pub fn after(search_text: &str, filter: &SearchFilter, start_index: usize, len: usize) -> Self {
        Self {
            search_text: search_text.to_string(),
            filter: filter.clone(),
            start_index: start_index + len,
        }
    }
}

/// Resume paging of a specific query shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinuationToken {
    /// Issued by a multi-source feed: one cursor per source that has more pages.
    Federated {
        /// Feed instance that issued the token.
        feed: Uuid,
        /// Original query text.
        search_text: String,
        /// Filter the query was issued with.
        filter: SearchFilter,
        /// Resume cursor per source name.
        cursors: BTreeMap<String, SourceCursor>,
        /// Sources that delivered their last page. Any other source without
        /// a cursor was never heard from and is reported as `Unknown`.
        exhausted: BTreeSet<String>,
    },
    /// Issued by a single-source feed.
    Single {
        /// Feed instance that issued the token.
        feed: Uuid,
        /// Resume cursor, carrying the start index.
        cursor: SourceCursor,
    },
}

impl ContinuationToken {
    /// The feed instance that issued this token.
    pub fn feed(&self) -> Uuid {
        match self {
            Self::Federated { feed, .. } | Self::Single { feed, .. } => *feed,
        }
    }

    /// The query text this token resumes.
    pub fn search_text(&self) -> &str {
        match self {
            Self::Federated { search_text, .. } => search_text,
            Self::Single { cursor, .. } => &cursor.search_text,
        }
    }
}

/// Outcome of one source call, settled once and shareable between tokens.
#[derive(Debug, Clone)]
pub enum SourceOutcome {
    /// The source delivered a page.
    Completed(SourcePage),
    /// The source call failed or its task panicked.
    Failed(String),
    /// The call was cancelled before it completed.
    Cancelled,
}

/// A per-source call that may still be running.
///
/// The spawned task publishes its outcome on a watch channel, so whether the
/// call has settled is known without anyone polling it. Clones observe the
/// same call.
#[derive(Clone)]
pub struct PendingSearch {
    outcome: watch::Receiver<Option<SourceOutcome>>,
}

impl PendingSearch {
    pub(crate) fn new(outcome: watch::Receiver<Option<SourceOutcome>>) -> Self {
        Self { outcome }
    }

    /// The settled outcome, or `None` while the call is still running.
    ///
    /// A task that ended without publishing an outcome counts as failed.
    pub fn peek(&self) -> Option<SourceOutcome> {
        let current = (*self.outcome.borrow()).clone();
        if current.is_some() {
            return current;
        }
        if self.outcome.has_changed().is_err() {
            let last = (*self.outcome.borrow()).clone();
            return Some(last.unwrap_or_else(abandoned));
        }
        None
    }

    /// Wait until the call settles.
    pub async fn settled(&self) -> SourceOutcome {
        let mut outcome = self.outcome.clone();
        let settled = match outcome.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };
        settled.unwrap_or_else(abandoned)
    }
}

fn abandoned() -> SourceOutcome {
    SourceOutcome::Failed("source task ended without an outcome".into())
}

/// Re-poll sources that had not answered within the time budget.
///
/// Holds every per-source call of the originating request, settled or not,
/// so a refresh takes a fresh snapshot of the whole request. Dropping the
/// token releases the handles; the underlying tasks run to completion on
/// their own.
#[derive(Clone)]
pub struct RefreshToken {
    pub(crate) feed: Uuid,
    pub(crate) search_text: String,
    pub(crate) filter: SearchFilter,
    pub(crate) searches: Vec<(String, PendingSearch)>,
    pub(crate) exhausted: BTreeSet<String>,
    pub(crate) retry_after: Duration,
}

impl RefreshToken {
    /// The feed instance that issued this token.
    pub fn feed(&self) -> Uuid {
        self.feed
    }

    /// The query text of the originating request.
    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    /// The filter of the originating request.
    pub fn filter(&self) -> &SearchFilter {
        &self.filter
    }

    /// Suggested delay before calling refresh.
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }

    /// Names of the sources whose calls have not settled yet.
    pub fn pending_sources(&self) -> Vec<&str> {
        self.searches
            .iter()
            .filter(|(_, search)| search.peek().is_none())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshToken")
            .field("feed", &self.feed)
            .field("pending", &self.pending_sources())
            .field("retry_after", &self.retry_after)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_after_advances_start_index() {
        let cursor = SourceCursor::after("json", &SearchFilter::default(), 25, 25);
        assert_eq!(cursor.start_index, 50);
        assert_eq!(cursor.search_text, "json");
    }

    #[test]
    fn token_accessors() {
        let feed = Uuid::new_v4();
        let token = ContinuationToken::Single {
            feed,
            cursor: SourceCursor::after("xunit", &SearchFilter::default(), 0, 10),
        };
        assert_eq!(token.feed(), feed);
        assert_eq!(token.search_text(), "xunit");
    }

    fn token_with(searches: Vec<(String, PendingSearch)>) -> RefreshToken {
        RefreshToken {
            feed: Uuid::new_v4(),
            search_text: "json".into(),
            filter: SearchFilter::default(),
            searches,
            exhausted: BTreeSet::new(),
            retry_after: Duration::from_millis(100),
        }
    }

    #[test]
    fn pending_sources_lists_unsettled_calls() {
        let (done_tx, done_rx) = watch::channel(None);
        done_tx.send_replace(Some(SourceOutcome::Cancelled));
        let (_slow_tx, slow_rx) = watch::channel(None);

        let token = token_with(vec![
            ("fast".into(), PendingSearch::new(done_rx)),
            ("slow".into(), PendingSearch::new(slow_rx)),
        ]);
        assert_eq!(token.pending_sources(), vec!["slow"]);
        assert!(format!("{token:?}").contains("slow"));
    }

    #[tokio::test]
    async fn settles_without_being_awaited() {
        let (tx, rx) = watch::channel(None);
        let token = token_with(vec![("slow".into(), PendingSearch::new(rx))]);
        assert_eq!(token.pending_sources(), vec!["slow"]);

        tx.send_replace(Some(SourceOutcome::Cancelled));
        assert!(token.pending_sources().is_empty());
        assert!(matches!(
            token.searches[0].1.settled().await,
            SourceOutcome::Cancelled
        ));
    }

    #[tokio::test]
    async fn dropped_sender_settles_as_failed() {
        let (tx, rx) = watch::channel(None);
        let pending = PendingSearch::new(rx);
        drop(tx);
        assert!(matches!(pending.peek(), Some(SourceOutcome::Failed(_))));
        assert!(matches!(pending.settled().await, SourceOutcome::Failed(_)));
    }
}
