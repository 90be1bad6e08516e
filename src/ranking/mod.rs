//! Ranking of candidate entries.
//!
//! A [`Ranker`] scores the union of all entries returned for one query and
//! produces a [`Ranking`]: one integer per package id, higher is better.
//! Entries a ranker cannot score receive [`UNRANKED`] unless the ranker's
//! [`UnrankedPolicy`] derives a value from their neighbours.

pub mod index;
pub mod popularity;
pub mod query;
pub mod relevance;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::metadata::PackageSearchMetadata;
use crate::types::IdKey;

pub use popularity::PopularityRanker;
pub use relevance::RelevanceRanker;

/// Sentinel rank for entries that could not be scored.
pub const UNRANKED: i64 = -1;

/// Rank per package id key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ranking {
    ranks: HashMap<IdKey, i64>,
}

impl Ranking {
    /// An empty ranking.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rank of `key`.
    pub fn insert(&mut self, key: IdKey, rank: i64) {
        self.ranks.insert(key, rank);
    }

    /// The rank of `key`, if it has one.
    pub fn get(&self, key: &IdKey) -> Option<i64> {
        self.ranks.get(key).copied()
    }

    /// Whether `key` has been assigned a rank (possibly [`UNRANKED`]).
    pub fn contains(&self, key: &IdKey) -> bool {
        self.ranks.contains_key(key)
    }

    /// Whether `key` has a real rank.
    pub fn is_ranked(&self, key: &IdKey) -> bool {
        self.get(key).is_some_and(|rank| rank != UNRANKED)
    }

    /// Number of ids in the ranking.
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    /// Whether the ranking is empty.
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

impl FromIterator<(IdKey, i64)> for Ranking {
    fn from_iter<I: IntoIterator<Item = (IdKey, i64)>>(iter: I) -> Self {
        Self {
            ranks: iter.into_iter().collect(),
        }
    }
}

/// How a ranker fills in ranks for entries it could not score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnrankedPolicy {
    /// Unscored entries get [`UNRANKED`].
    Sentinel,
    /// Unscored entries take the rank of the nearest ranked entry that
    /// follows them in the sequence, or [`UNRANKED`] if none follows.
    AnchorToFollowing,
}

impl UnrankedPolicy {
    /// Fill `ranking` for every entry of `entries` under this policy.
    ///
    /// Entries that already hold a real rank are left untouched.
    pub fn apply(self, entries: &[PackageSearchMetadata], ranking: &mut Ranking) {
        match self {
            Self::Sentinel => {
                for entry in entries {
                    let key = entry.id_key();
                    if !ranking.contains(&key) {
                        ranking.insert(key, UNRANKED);
                    }
                }
            }
            Self::AnchorToFollowing => {
                let mut following = UNRANKED;
                for entry in entries.iter().rev() {
                    let key = entry.id_key();
                    match ranking.get(&key) {
                        Some(rank) if rank != UNRANKED => following = rank,
                        _ => ranking.insert(key, following),
                    }
                }
            }
        }
    }
}

/// Scores candidate entries against a query.
pub trait Ranker: Send + Sync {
    /// Rank `entries` for `query`. Every entry's id appears in the result.
    fn rank(&self, query: &str, entries: &[PackageSearchMetadata]) -> Ranking;

    /// The gap-filling policy of this ranker.
    fn unranked_policy(&self) -> UnrankedPolicy {
        UnrankedPolicy::Sentinel
    }

    /// Fill ranks for unscored `entries`, returning `entries` for chaining.
    fn fill_unranked<'a>(
        &self,
        entries: &'a [PackageSearchMetadata],
        ranking: &mut Ranking,
    ) -> &'a [PackageSearchMetadata] {
        self.unranked_policy().apply(entries, ranking);
        entries
    }
}

/// Which ranker a feed uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankerKind {
    /// Text relevance over an ephemeral inverted index.
    #[default]
    Relevance,
    /// Raw download counts.
    Popularity,
}

impl RankerKind {
    /// Build the ranker for this kind.
    pub fn build(self) -> Arc<dyn Ranker> {
        match self {
            Self::Relevance => Arc::new(RelevanceRanker::new()),
            Self::Popularity => Arc::new(PopularityRanker),
        }
    }
}
