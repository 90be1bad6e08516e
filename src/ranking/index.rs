//! Ephemeral inverted index over a candidate set.
//!
//! The index is built from the entries of a single ranking pass and thrown
//! away afterwards; there is no standing corpus. Scoring is a field-boosted
//! TF-IDF sum over the query clauses.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::metadata::PackageSearchMetadata;

use super::query::{tokenize, Clause, Field, QueryAst};

/// Boost for exact `packageid:` matches.
const EXACT_ID_BOOST: f64 = 10.0;

fn field_boost(field: Field) -> f64 {
    match field {
        Field::Id => 4.0,
        Field::Title | Field::Tags => 2.0,
        Field::Summary | Field::Description => 1.0,
        Field::Version => 0.5,
    }
}

/// A document that matched a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Position of the entry in the indexed slice.
    pub doc: usize,
    /// Accumulated score, always positive.
    pub score: f64,
}

/// Executes a query against a candidate set, best hit first.
///
/// Implementations must return each matching document once and must break
/// score ties by document position so that repeated calls agree.
pub trait TextScorer: Send + Sync {
    /// Return the matching documents of `entries`, best first.
    fn search(&self, query: &QueryAst, entries: &[PackageSearchMetadata]) -> Vec<Hit>;
}

#[derive(Debug, Clone, Copy)]
struct Posting {
    doc: usize,
    term_frequency: u32,
}

/// Inverted index over the fields {Id, Version, Title, Description, Summary, Tags}.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    postings: HashMap<(Field, String), Vec<Posting>>,
    ids: Vec<String>,
}

impl InvertedIndex {
    /// Index `entries`; document numbers are slice positions.
    pub fn build(entries: &[PackageSearchMetadata]) -> Self {
        let mut index = Self::default();
        for (doc, entry) in entries.iter().enumerate() {
            let id_key = entry.id_key().as_str().to_string();

            let mut id_tokens = tokenize(&entry.identity.id);
            if !id_tokens.contains(&id_key) {
                id_tokens.push(id_key.clone());
            }
            index.add(doc, Field::Id, id_tokens);
            index.add(doc, Field::Version, tokenize(&entry.identity.version.to_string()));
            index.add(doc, Field::Title, tokenize(&entry.title));
            index.add(doc, Field::Description, tokenize(&entry.description));
            index.add(doc, Field::Summary, tokenize(&entry.summary));
            index.add(
                doc,
                Field::Tags,
                entry.tags.iter().flat_map(|t| tokenize(t)).collect(),
            );
            index.ids.push(id_key);
        }
        index
    }

    fn add(&mut self, doc: usize, field: Field, tokens: Vec<String>) {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for token in tokens {
            *counts.entry(token).or_default() += 1;
        }
        for (token, term_frequency) in counts {
            self.postings
                .entry((field, token))
                .or_default()
                .push(Posting {
                    doc,
                    term_frequency,
                });
        }
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing was indexed.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Execute `query`, returning hits by descending score, ties by position.
    pub fn search(&self, query: &QueryAst) -> Vec<Hit> {
        let mut scores: HashMap<usize, f64> = HashMap::new();
        let doc_count = self.len() as f64;

        for clause in &query.clauses {
            match clause {
                Clause::ExactId(id) => {
                    for (doc, key) in self.ids.iter().enumerate() {
                        if key == id {
                            *scores.entry(doc).or_default() += EXACT_ID_BOOST;
                        }
                    }
                }
                Clause::Term { field, token } => {
                    let fields: &[Field] = match field {
                        Some(f) => std::slice::from_ref(f),
                        None => &Field::ALL[..],
                    };
                    for field in fields {
                        let Some(postings) = self.postings.get(&(*field, token.clone())) else {
                            continue;
                        };
                        let idf = 1.0 + (doc_count / postings.len() as f64).ln();
                        for posting in postings {
                            *scores.entry(posting.doc).or_default() +=
                                f64::from(posting.term_frequency) * idf * field_boost(*field);
                        }
                    }
                }
            }
        }

        let mut hits: Vec<Hit> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .map(|(doc, score)| Hit { doc, score })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.doc.cmp(&b.doc))
        });
        hits
    }
}

/// The production scorer: builds an [`InvertedIndex`] per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvertedIndexScorer;

impl TextScorer for InvertedIndexScorer {
    fn search(&self, query: &QueryAst, entries: &[PackageSearchMetadata]) -> Vec<Hit> {
        if query.is_empty() || entries.is_empty() {
            return Vec::new();
        }
        let index = InvertedIndex::build(entries);
        let mut seen = HashSet::new();
        index
            .search(query)
            .into_iter()
            .filter(|hit| seen.insert(index.ids[hit.doc].clone()))
            .collect()
    }
}
