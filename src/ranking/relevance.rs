//! Text relevance ranking.

use crate::metadata::PackageSearchMetadata;

use super::index::{InvertedIndexScorer, TextScorer};
use super::query::build_query;
use super::{Ranker, Ranking, UnrankedPolicy, UNRANKED};

/// Ranks entries by text relevance over an ephemeral index of the
/// candidate set.
///
/// The best hit of `n` receives rank `n - 1`, the worst receives `0`, so one
/// pass never produces ties among ranked entries. Entries with no hit get
/// [`UNRANKED`]; [`fill_unranked`](Ranker::fill_unranked) then anchors them
/// to the nearest ranked entry that follows them.
#[derive(Debug, Clone, Default)]
pub struct RelevanceRanker<S = InvertedIndexScorer> {
    scorer: S,
}

impl RelevanceRanker {
    /// A ranker backed by the inverted-index scorer.
    pub fn new() -> Self {
        Self {
            scorer: InvertedIndexScorer,
        }
    }
}

impl<S: TextScorer> RelevanceRanker<S> {
    /// Use a custom scorer.
    pub fn with_scorer(scorer: S) -> Self {
        Self { scorer }
    }
}

impl<S: TextScorer> Ranker for RelevanceRanker<S> {
    fn rank(&self, query: &str, entries: &[PackageSearchMetadata]) -> Ranking {
        let ast = build_query(query);
        let hits = self.scorer.search(&ast, entries);
        let hit_count = hits.len() as i64;

        let mut ranking = Ranking::new();
        for (position, hit) in hits.iter().enumerate() {
            let Some(entry) = entries.get(hit.doc) else {
                continue;
            };
            let key = entry.id_key();
            if !ranking.contains(&key) {
                ranking.insert(key, hit_count - 1 - position as i64);
            }
        }
        for entry in entries {
            let key = entry.id_key();
            if !ranking.contains(&key) {
                ranking.insert(key, UNRANKED);
            }
        }
        ranking
    }

    fn unranked_policy(&self) -> UnrankedPolicy {
        UnrankedPolicy::AnchorToFollowing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::index::Hit;
    use crate::ranking::query::QueryAst;
    use crate::types::{IdKey, PackageIdentity};
    use crate::version::PackageVersion;

    fn record(id: &str, description: &str) -> PackageSearchMetadata {
        let version = PackageVersion::parse("1.0.0").expect("valid version");
        PackageSearchMetadata::new(PackageIdentity::new(id, version)).with_description(description)
    }

    fn rank_of(ranking: &Ranking, id: &str) -> Option<i64> {
        ranking.get(&IdKey::new(id))
    }

    #[test]
    fn ranks_are_dense_and_descending() {
        let entries = vec![
            record("Serilog", "logging"),
            record("Newtonsoft.Json", "json framework"),
            record("Json.NET.Schema", "schema"),
            record("System.Text.Json", "json apis"),
        ];
        let ranking = RelevanceRanker::new().rank("json", &entries);

        assert_eq!(ranking.len(), 4);
        assert_eq!(rank_of(&ranking, "Serilog"), Some(UNRANKED));
        let mut ranked: Vec<i64> = ["Newtonsoft.Json", "Json.NET.Schema", "System.Text.Json"]
            .iter()
            .filter_map(|id| rank_of(&ranking, id))
            .collect();
        ranked.sort_unstable();
        assert_eq!(ranked, vec![0, 1, 2]);
    }

    #[test]
    fn fill_unranked_anchors_to_following_entry() {
        let entries = vec![
            record("Unrelated.One", "nothing"),
            record("Newtonsoft.Json", "json"),
            record("Unrelated.Two", "nothing"),
        ];
        let ranker = RelevanceRanker::new();
        let mut ranking = ranker.rank("json", &entries);
        let returned = ranker.fill_unranked(&entries, &mut ranking);

        assert_eq!(returned.len(), entries.len());
        assert_eq!(rank_of(&ranking, "Unrelated.One"), Some(0));
        assert_eq!(rank_of(&ranking, "Newtonsoft.Json"), Some(0));
        assert_eq!(rank_of(&ranking, "Unrelated.Two"), Some(UNRANKED));
    }

    struct ReverseScorer;

    impl TextScorer for ReverseScorer {
        fn search(&self, _query: &QueryAst, entries: &[PackageSearchMetadata]) -> Vec<Hit> {
            (0..entries.len())
                .rev()
                .map(|doc| Hit { doc, score: 1.0 })
                .collect()
        }
    }

    #[test]
    fn scorer_is_swappable() {
        let entries = vec![record("a", ""), record("b", ""), record("c", "")];
        let ranking = RelevanceRanker::with_scorer(ReverseScorer).rank("anything", &entries);
        assert_eq!(rank_of(&ranking, "c"), Some(2));
        assert_eq!(rank_of(&ranking, "a"), Some(0));
    }

    #[test]
    fn empty_query_ranks_nothing() {
        let entries = vec![record("a", "x")];
        let ranking = RelevanceRanker::new().rank("  ", &entries);
        assert_eq!(rank_of(&ranking, "a"), Some(UNRANKED));
    }
}
