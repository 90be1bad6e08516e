//! K-way merge of id-ordered asynchronous streams.
//!
//! Used by enumeration ("list every package") where no relevance ranking
//! applies. Every input stream yields entries in ascending key order. The
//! merger holds only the current head of each stream, emits the smallest
//! key next, and combines all heads sharing that key into one entry.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::Hash;

use futures::future::join_all;
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::error::SearchError;
use crate::metadata::PackageSearchMetadata;
use crate::types::{compare_ids, IdKey};

use super::splice::splice;

type Input<T> = BoxStream<'static, Result<T, SearchError>>;

struct MergeState<T, K, KeyFn, CmpFn, CombineFn> {
    inputs: Vec<Option<Input<T>>>,
    heads: Vec<Option<T>>,
    primed: bool,
    emitted: HashSet<K>,
    key_of: KeyFn,
    compare: CmpFn,
    combine: CombineFn,
}

impl<T, K, KeyFn, CmpFn, CombineFn> MergeState<T, K, KeyFn, CmpFn, CombineFn>
where
    K: Eq + Hash,
    KeyFn: Fn(&T) -> K,
    CmpFn: Fn(&K, &K) -> Ordering,
    CombineFn: Fn(T, T) -> Result<T, SearchError>,
{
    /// Replace the head of input `i` with its next item.
    async fn advance(&mut self, i: usize) {
        let next = match self.inputs[i].as_mut() {
            Some(input) => input.next().await,
            None => None,
        };
        self.accept(i, next);
    }

    /// Pull the first item of every input concurrently.
    async fn prime(&mut self) {
        let firsts = join_all(self.inputs.iter_mut().map(|input| async move {
            match input.as_mut() {
                Some(input) => input.next().await,
                None => None,
            }
        }))
        .await;
        for (i, first) in firsts.into_iter().enumerate() {
            self.accept(i, first);
        }
        self.primed = true;
    }

    /// Install `next` as the head of input `i`.
    ///
    /// An input that yields an error is logged and treated as exhausted.
    fn accept(&mut self, i: usize, next: Option<Result<T, SearchError>>) {
        self.heads[i] = None;
        match next {
            Some(Ok(item)) => self.heads[i] = Some(item),
            Some(Err(err)) => {
                tracing::warn!(input = i, error = %err, "enumeration stream failed");
                self.inputs[i] = None;
            }
            None => self.inputs[i] = None,
        }
    }

    /// Index of the head with the smallest key; earlier inputs win ties.
    fn winner(&self) -> Option<usize> {
        let mut best: Option<(usize, K)> = None;
        for (i, head) in self.heads.iter().enumerate() {
            let Some(item) = head else { continue };
            let key = (self.key_of)(item);
            let replace = match &best {
                Some((_, best_key)) => (self.compare)(&key, best_key) == Ordering::Less,
                None => true,
            };
            if replace {
                best = Some((i, key));
            }
        }
        best.map(|(i, _)| i)
    }

    async fn next_merged(&mut self) -> Option<Result<T, SearchError>> {
        if !self.primed {
            self.prime().await;
        }

        loop {
            let winner = self.winner()?;
            let mut merged = self.heads[winner].take()?;
            let key = (self.key_of)(&merged);
            self.advance(winner).await;

            for i in 0..self.heads.len() {
                let same = self.heads[i]
                    .as_ref()
                    .is_some_and(|item| (self.compare)(&(self.key_of)(item), &key) == Ordering::Equal);
                if !same {
                    continue;
                }
                if let Some(item) = self.heads[i].take() {
                    merged = match (self.combine)(merged, item) {
                        Ok(combined) => combined,
                        Err(err) => return Some(Err(err)),
                    };
                }
                self.advance(i).await;
            }

            if self.emitted.insert(key) {
                return Some(Ok(merged));
            }
        }
    }
}

/// Merge key-ordered streams, grouping entries with equal keys.
///
/// `key_of` extracts the grouping key, `compare` orders keys, and `combine`
/// folds two entries with equal keys into one. Keys already emitted are
/// skipped if they reappear. The returned stream is independent of any
/// other call and holds at most one pending item per input.
pub fn merge_sorted_by<T, K, KeyFn, CmpFn, CombineFn>(
    inputs: Vec<Input<T>>,
    key_of: KeyFn,
    compare: CmpFn,
    combine: CombineFn,
) -> impl Stream<Item = Result<T, SearchError>>
where
    T: Send + 'static,
    K: Eq + Hash + Send + 'static,
    KeyFn: Fn(&T) -> K + Send + 'static,
    CmpFn: Fn(&K, &K) -> Ordering + Send + 'static,
    CombineFn: Fn(T, T) -> Result<T, SearchError> + Send + 'static,
{
    let state = MergeState {
        heads: inputs.iter().map(|_| None).collect(),
        inputs: inputs.into_iter().map(Some).collect(),
        primed: false,
        emitted: HashSet::new(),
        key_of,
        compare,
        combine,
    };
    stream::unfold(state, |mut state| async move {
        let item = state.next_merged().await?;
        Some((item, state))
    })
}

/// Merge id-ordered package streams, splicing records that share an id.
pub fn merge_package_streams(
    inputs: Vec<Input<PackageSearchMetadata>>,
) -> BoxStream<'static, Result<PackageSearchMetadata, SearchError>> {
    merge_sorted_by(
        inputs,
        PackageSearchMetadata::id_key,
        |a: &IdKey, b: &IdKey| compare_ids(a, b),
        |a, b| splice(&a, &b),
    )
    .boxed()
}
