//! Download-count ranking.

use crate::metadata::PackageSearchMetadata;

use super::{Ranker, Ranking, UNRANKED};

/// Ranks entries by raw download count. Ties are possible; entries without
/// a download count get [`UNRANKED`]. There is no gap filling.
#[derive(Debug, Clone, Copy, Default)]
pub struct PopularityRanker;

impl Ranker for PopularityRanker {
    fn rank(&self, _query: &str, entries: &[PackageSearchMetadata]) -> Ranking {
        let mut ranking = Ranking::new();
        for entry in entries {
            let rank = entry
                .download_count
                .map_or(UNRANKED, |count| i64::try_from(count).unwrap_or(i64::MAX));
            let key = entry.id_key();
            let best = ranking.get(&key).map_or(rank, |existing| existing.max(rank));
            ranking.insert(key, best);
        }
        ranking
    }
}
