//! Merge of per-source ranked result lists into one ordered, de-duplicated list.
//!
//! # Algorithm
//!
//! 1. Splice every id seen in more than one source into one record and rank
//!    the union once, then let the ranker fill ranks for unscored entries of
//!    each source list.
//! 2. Treat each source list as a queue. While two or more queues remain,
//!    find the best rank `R` among the queue heads and emit (once) and
//!    advance every head ranked `R`.
//! 3. Before each round, drop heads that were already emitted or carry no
//!    rank at all.
//! 4. When a single queue remains, flush its un-emitted, ranked entries in
//!    order.
//!
//! The output keeps each source's relative order when ranks are sparse or
//! tied while letting a strictly better head from any source jump ahead.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::SearchError;
use crate::metadata::PackageSearchMetadata;
use crate::ranking::{Ranker, Ranking};
use crate::types::IdKey;

use super::splice::splice;

/// Merges per-source result lists with a shared ranking.
#[derive(Clone)]
pub struct ResultAggregator {
    ranker: Arc<dyn Ranker>,
}

impl ResultAggregator {
    /// Create an aggregator using `ranker`.
    pub fn new(ranker: Arc<dyn Ranker>) -> Self {
        Self { ranker }
    }

    /// Aggregate `per_source` lists for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Cancelled`] if `cancel` fires during the merge,
    /// or [`SearchError::SplicerMismatch`] if splicing is handed mismatched
    /// records.
    pub fn aggregate(
        &self,
        query: &str,
        per_source: &[Vec<PackageSearchMetadata>],
        cancel: &CancellationToken,
    ) -> Result<Vec<PackageSearchMetadata>, SearchError> {
        let (merged, union_order) = splice_sources(per_source)?;
        let union: Vec<PackageSearchMetadata> = union_order
            .iter()
            .filter_map(|key| merged.get(key).cloned())
            .collect();

        let mut ranking = self.ranker.rank(query, &union);
        for list in per_source {
            self.ranker.fill_unranked(list, &mut ranking);
        }

        let order = merge_ranked(per_source, &ranking, cancel)?;
        tracing::debug!(
            sources = per_source.len(),
            unique = order.len(),
            "aggregated source results"
        );
        Ok(order
            .iter()
            .filter_map(|key| merged.get(key).cloned())
            .collect())
    }
}

type Spliced = (HashMap<IdKey, PackageSearchMetadata>, Vec<IdKey>);

/// Splice same-id records across sources, keeping first-appearance order.
fn splice_sources(per_source: &[Vec<PackageSearchMetadata>]) -> Result<Spliced, SearchError> {
    let mut merged: HashMap<IdKey, PackageSearchMetadata> = HashMap::new();
    let mut order = Vec::new();

    for entry in per_source.iter().flatten() {
        let key = entry.id_key();
        match merged.get(&key) {
            Some(existing) => {
                let spliced = splice(existing, entry)?;
                merged.insert(key, spliced);
            }
            None => {
                order.push(key.clone());
                merged.insert(key, entry.clone());
            }
        }
    }
    Ok((merged, order))
}

/// Round-robin winner-take-all merge of per-source id queues.
fn merge_ranked(
    per_source: &[Vec<PackageSearchMetadata>],
    ranking: &Ranking,
    cancel: &CancellationToken,
) -> Result<Vec<IdKey>, SearchError> {
    let mut queues: Vec<VecDeque<IdKey>> = per_source
        .iter()
        .map(|list| list.iter().map(PackageSearchMetadata::id_key).collect())
        .collect();
    let mut emitted: HashSet<IdKey> = HashSet::new();
    let mut order = Vec::new();

    loop {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        for queue in &mut queues {
            while queue
                .front()
                .is_some_and(|head| emitted.contains(head) || !ranking.contains(head))
            {
                queue.pop_front();
            }
        }
        queues.retain(|queue| !queue.is_empty());

        if queues.len() <= 1 {
            for key in queues.drain(..).flatten() {
                if ranking.contains(&key) && emitted.insert(key.clone()) {
                    order.push(key);
                }
            }
            break;
        }

        let Some(best) = queues
            .iter()
            .filter_map(|queue| queue.front())
            .filter_map(|head| ranking.get(head))
            .max()
        else {
            break;
        };

        for queue in &mut queues {
            if queue.front().and_then(|head| ranking.get(head)) == Some(best) {
                if let Some(key) = queue.pop_front() {
                    if emitted.insert(key.clone()) {
                        order.push(key);
                    }
                }
            }
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::{PopularityRanker, RelevanceRanker, UNRANKED};
    use crate::types::{PackageIdentity, VersionInfo};
    use crate::version::PackageVersion;

    /// Ranker returning fixed ranks, for exercising the merge in isolation.
    struct FixedRanker(Vec<(&'static str, i64)>);

    impl Ranker for FixedRanker {
        fn rank(&self, _query: &str, entries: &[PackageSearchMetadata]) -> Ranking {
            entries
                .iter()
                .map(|e| {
                    let rank = self
                        .0
                        .iter()
                        .find(|(id, _)| IdKey::new(id) == e.id_key())
                        .map_or(UNRANKED, |(_, rank)| *rank);
                    (e.id_key(), rank)
                })
                .collect()
        }
    }

    fn record(id: &str, version: &str) -> PackageSearchMetadata {
        let version = PackageVersion::parse(version).expect("valid version");
        PackageSearchMetadata::new(PackageIdentity::new(id, version))
    }

    fn ids(items: &[PackageSearchMetadata]) -> Vec<String> {
        items.iter().map(|m| m.identity.id.clone()).collect()
    }

    fn aggregate_fixed(
        ranks: Vec<(&'static str, i64)>,
        per_source: &[Vec<PackageSearchMetadata>],
    ) -> Vec<PackageSearchMetadata> {
        ResultAggregator::new(Arc::new(FixedRanker(ranks)))
            .aggregate("q", per_source, &CancellationToken::new())
            .expect("aggregate")
    }

    #[tokio::test]
    async fn json_scenario_splices_and_orders() {
        let s1 = vec![record("Newtonsoft.Json", "13.0.1"), record("System.Text.Json", "8.0.0")];
        let s2 = vec![record("newtonsoft.json", "12.0.3"), record("Json.NET.Schema", "3.0.0")];
        let ranks = vec![("Newtonsoft.Json", 5), ("System.Text.Json", 2), ("Json.NET.Schema", 1)];

        let result = aggregate_fixed(ranks, &[s1, s2]);

        assert_eq!(
            ids(&result),
            vec!["Newtonsoft.Json", "System.Text.Json", "Json.NET.Schema"]
        );
        let versions: Vec<VersionInfo> = result[0].versions().await.to_vec();
        assert_eq!(versions.len(), 2);
        assert_eq!(result[0].identity.version.to_string(), "13.0.1");
    }

    #[test]
    fn no_duplicate_ids() {
        let s1 = vec![record("a", "1.0"), record("b", "1.0"), record("A", "1.0")];
        let s2 = vec![record("B", "2.0"), record("a", "2.0"), record("c", "1.0")];
        let result = aggregate_fixed(vec![("a", 3), ("b", 2), ("c", 1)], &[s1, s2]);

        let mut keys: Vec<IdKey> = result.iter().map(PackageSearchMetadata::id_key).collect();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), total);
        assert_eq!(total, 3);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let per_source = vec![
            vec![record("a", "1.0"), record("b", "1.0"), record("c", "1.0")],
            vec![record("d", "1.0"), record("b", "1.0"), record("e", "1.0")],
            vec![record("f", "1.0")],
        ];
        let ranks = vec![("a", 1), ("b", 4), ("c", 1), ("d", 2), ("e", 0), ("f", 2)];
        let first = ids(&aggregate_fixed(ranks.clone(), &per_source));
        let second = ids(&aggregate_fixed(ranks, &per_source));
        assert_eq!(first, second);
    }

    #[test]
    fn strictly_higher_head_jumps_ahead() {
        let s1 = vec![record("low", "1.0"), record("lower", "1.0")];
        let s2 = vec![record("high", "1.0"), record("other", "1.0")];
        let result = aggregate_fixed(
            vec![("low", 1), ("lower", 0), ("high", 9), ("other", 0)],
            &[s1, s2],
        );
        assert_eq!(ids(&result), vec!["high", "low", "lower", "other"]);
    }

    #[test]
    fn tail_flush_preserves_source_order() {
        let long: Vec<PackageSearchMetadata> =
            (0..10).map(|i| record(&format!("a{i}"), "1.0")).collect();
        let short = vec![record("b0", "1.0"), record("b1", "1.0"), record("b2", "1.0")];
        let mut ranks: Vec<(&'static str, i64)> = vec![("b0", 100), ("b1", 99), ("b2", 98)];
        let names: [&'static str; 10] = ["a0", "a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8", "a9"];
        ranks.extend(names.iter().zip([1, 50, 2, 60, 3, 70, 4, 80, 5, 90]).map(|(n, r)| (*n, r)));

        let result = aggregate_fixed(ranks, &[long, short]);
        let order = ids(&result);

        assert_eq!(&order[..3], &["b0", "b1", "b2"]);
        assert_eq!(
            &order[3..],
            &["a0", "a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8", "a9"]
        );
    }

    /// Ranks only the listed ids and leaves every other entry out.
    struct SparseRanker(Vec<(&'static str, i64)>);

    impl Ranker for SparseRanker {
        fn rank(&self, _query: &str, entries: &[PackageSearchMetadata]) -> Ranking {
            entries
                .iter()
                .filter_map(|e| {
                    self.0
                        .iter()
                        .find(|(id, _)| IdKey::new(id) == e.id_key())
                        .map(|(_, rank)| (e.id_key(), *rank))
                })
                .collect()
        }

        fn fill_unranked<'a>(
            &self,
            entries: &'a [PackageSearchMetadata],
            _ranking: &mut Ranking,
        ) -> &'a [PackageSearchMetadata] {
            entries
        }
    }

    #[test]
    fn entries_missing_from_ranking_are_dropped_wherever_they_sit() {
        let s1 = vec![
            record("skipped.head", "1.0"),
            record("a", "1.0"),
            record("skipped.tail", "1.0"),
            record("c", "1.0"),
        ];
        let s2 = vec![record("b", "1.0")];
        let result = ResultAggregator::new(Arc::new(SparseRanker(vec![("a", 1), ("b", 2), ("c", 0)])))
            .aggregate("q", &[s1, s2], &CancellationToken::new())
            .expect("aggregate");
        assert_eq!(ids(&result), vec!["b", "a", "c"]);
    }

    #[test]
    fn tied_ranks_interleave_round_robin() {
        let s1 = vec![record("a1", "1.0"), record("a2", "1.0")];
        let s2 = vec![record("b1", "1.0"), record("b2", "1.0")];
        let result = aggregate_fixed(vec![], &[s1, s2]);
        assert_eq!(ids(&result), vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn empty_and_single_source() {
        assert!(aggregate_fixed(vec![], &[]).is_empty());
        assert!(aggregate_fixed(vec![], &[vec![], vec![]]).is_empty());
        let only = vec![record("x", "1.0"), record("y", "1.0")];
        assert_eq!(ids(&aggregate_fixed(vec![("y", 5)], &[only])), vec!["x", "y"]);
    }

    #[test]
    fn cancellation_unwinds_without_result() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = ResultAggregator::new(Arc::new(PopularityRanker)).aggregate(
            "q",
            &[vec![record("a", "1.0")], vec![record("b", "1.0")]],
            &cancel,
        );
        assert!(matches!(result, Err(SearchError::Cancelled)));
    }

    #[test]
    fn relevance_ranker_anchors_unscored_entries() {
        let s1 = vec![
            record("Newtonsoft.Json", "13.0").with_description("json framework"),
            record("Serilog", "3.0").with_description("logging"),
        ];
        let s2 = vec![
            record("Unrelated", "1.0").with_description("nothing"),
            record("System.Text.Json", "8.0").with_description("json"),
        ];
        let result = ResultAggregator::new(Arc::new(RelevanceRanker::new()))
            .aggregate("json", &[s1, s2], &CancellationToken::new())
            .expect("aggregate");

        // Unrelated takes System.Text.Json's rank and stays just ahead of it;
        // Serilog has nothing ranked behind it and sinks to the end.
        assert_eq!(
            ids(&result),
            vec!["Newtonsoft.Json", "Unrelated", "System.Text.Json", "Serilog"]
        );
    }
}
