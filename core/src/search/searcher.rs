use std::collections::{BTreeSet, HashMap};

use super::query::{NormalizationType, Query, QueryType, RankingType};
use crate::link::HitsRanker;
use crate::postings::{self, PostingsEntry, PostingsList, Position};
use crate::storage::Index;
use crate::{DocId, IndexError, Result};

/// Weight of the normalised tf-idf score in a combined ranking.
pub const TFIDF_WEIGHT: f64 = 0.6;
/// Weight of the normalised PageRank score in a combined ranking.
pub const PAGERANK_WEIGHT: f64 = 0.4;

/// Evaluates queries against a built index.
pub struct Searcher<'a> {
    index: &'a dyn Index,
    hits: Option<&'a HitsRanker>,
}

impl<'a> Searcher<'a> {
    pub fn new(index: &'a dyn Index) -> Self {
        Self { index, hits: None }
    }

    pub fn with_hits(mut self, hits: &'a HitsRanker) -> Self {
        self.hits = Some(hits);
        self
    }

    /// Runs `query`. `None` means no answer: an empty query, a structural
    /// query with a word the index has never seen, or a ranked query none of
    /// whose words are indexed.
    pub fn search(
        &self,
        query: &Query,
        query_type: QueryType,
        ranking: RankingType,
        normalization: NormalizationType,
    ) -> Result<Option<PostingsList>> {
        if query.is_empty() {
            return Ok(None);
        }
        let lists = self.fetch(query)?;
        tracing::debug!(terms = query.len(), found = lists.iter().flatten().count(), %query_type, "evaluating query");

        match query_type {
            QueryType::Intersection => Ok(required(lists).map(intersect_all)),
            QueryType::Phrase => Ok(required(lists).map(phrase)),
            QueryType::Ranked => {
                let lists: Vec<PostingsList> = lists.into_iter().flatten().collect();
                if lists.is_empty() {
                    return Ok(None);
                }
                self.ranked(&lists, ranking, normalization).map(Some)
            }
        }
    }

    fn fetch(&self, query: &Query) -> Result<Vec<Option<PostingsList>>> {
        query
            .iter()
            .map(|qt| -> Result<Option<PostingsList>> {
                Ok(self.index.get_postings(&qt.term)?.map(|l| l.with_weight(qt.weight)))
            })
            .collect()
    }

    fn ranked(
        &self,
        lists: &[PostingsList],
        ranking: RankingType,
        normalization: NormalizationType,
    ) -> Result<PostingsList> {
        let mut answer = match ranking {
            RankingType::TfIdf => self.tfidf_ranking(lists, normalization),
            RankingType::PageRank => self.pagerank_ranking(lists),
            RankingType::Hits => {
                let hits = self.hits.ok_or(IndexError::NoLinkGraph)?;
                let candidates = lists.iter().fold(PostingsList::new(), |acc, l| postings::union(&acc, l));
                return Ok(hits.rank(&candidates, self.index.documents()));
            }
            RankingType::Combination => {
                let tfidf = self.tfidf_ranking(lists, normalization);
                let pagerank = self.pagerank_ranking(lists);
                combine_rankings(&tfidf, &pagerank)?
            }
        };
        answer.sort_by_score();
        Ok(answer)
    }

    /// Per-term tf-idf lists unioned by docID with scores summed.
    fn tfidf_ranking(&self, lists: &[PostingsList], normalization: NormalizationType) -> PostingsList {
        lists
            .iter()
            .map(|l| self.tfidf_scores(l, normalization))
            .reduce(|a, b| postings::union_scored(&a, &b, |x, y| x + y))
            .unwrap_or_default()
    }

    /// Each document's PageRank, counted once however many terms match it.
    fn pagerank_ranking(&self, lists: &[PostingsList]) -> PostingsList {
        let docs = self.index.documents();
        let candidates = lists.iter().fold(PostingsList::new(), |acc, l| postings::union(&acc, l));
        PostingsList::from_entries(
            candidates
                .doc_ids()
                .map(|id| PostingsEntry::scored(id, docs.pagerank(id)))
                .collect(),
        )
    }

    /// `tf * ln(N / df) / len(d) * weight` for every entry of one term.
    fn tfidf_scores(&self, list: &PostingsList, normalization: NormalizationType) -> PostingsList {
        let docs = self.index.documents();
        let idf = (self.index.num_docs() as f64 / list.len() as f64).ln();
        let entries = list
            .iter()
            .map(|e| {
                let length = match normalization {
                    NormalizationType::Euclidean => docs.norm(e.doc_id).or_else(|| docs.length(e.doc_id).map(f64::from)),
                    NormalizationType::Number => docs.length(e.doc_id).map(f64::from),
                };
                let score = match length {
                    Some(len) if len > 0.0 => e.term_frequency() as f64 * idf / len * list.weight,
                    _ => 0.0,
                };
                PostingsEntry::scored(e.doc_id, score)
            })
            .collect();
        PostingsList::from_entries(entries)
    }
}

fn required(lists: Vec<Option<PostingsList>>) -> Option<Vec<PostingsList>> {
    lists.into_iter().collect()
}

/// Structural intersection, smallest list first; stops as soon as the
/// running result is empty. Entries keep the first list's positions.
pub fn intersect_all(mut lists: Vec<PostingsList>) -> PostingsList {
    lists.sort_by_key(PostingsList::len);
    let mut lists = lists.into_iter();
    let Some(mut answer) = lists.next() else { return PostingsList::new() };
    for list in lists {
        if answer.is_empty() {
            break;
        }
        answer = postings::intersect(&answer, &list);
    }
    answer
}

/// Positions of `right` that directly follow a position of `left`.
fn joining_positions(left: &[Position], right: &[Position]) -> Vec<Position> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        let next = u64::from(left[i]) + 1;
        let r = u64::from(right[j]);
        if next == r {
            out.push(right[j]);
            i += 1;
            j += 1;
        } else if next < r {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

/// Documents containing the terms contiguously and in order. Each entry
/// carries the positions of the phrase's last word.
pub fn phrase(lists: Vec<PostingsList>) -> PostingsList {
    let candidates: BTreeSet<DocId> = intersect_all(lists.clone()).doc_ids().collect();
    let mut lists = lists.into_iter();
    let Some(first) = lists.next() else { return PostingsList::new() };
    let mut chain = PostingsList::from_entries(
        first
            .into_entries()
            .into_iter()
            .filter(|e| candidates.contains(&e.doc_id))
            .collect(),
    );
    for next in lists {
        let by_doc: HashMap<DocId, &PostingsEntry> = next.iter().map(|e| (e.doc_id, e)).collect();
        let entries = chain
            .iter()
            .filter_map(|left| {
                let right = by_doc.get(&left.doc_id)?;
                let joined = joining_positions(&left.positions, &right.positions);
                (!joined.is_empty()).then(|| PostingsEntry::with_positions(left.doc_id, joined))
            })
            .collect();
        chain = PostingsList::from_entries(entries);
        if chain.is_empty() {
            break;
        }
    }
    chain
}

/// Joins a tf-idf and a PageRank ranking by docID and scores each document
/// `0.6 * tfidf / Σtfidf + 0.4 * pagerank / Σpagerank`. Both rankings must
/// cover the same documents.
pub fn combine_rankings(tfidf: &PostingsList, pagerank: &PostingsList) -> Result<PostingsList> {
    let tf: HashMap<DocId, f64> = tfidf.iter().map(|e| (e.doc_id, e.score)).collect();
    let pr: HashMap<DocId, f64> = pagerank.iter().map(|e| (e.doc_id, e.score)).collect();

    let mut tfidf_only: Vec<DocId> = tf.keys().filter(|id| !pr.contains_key(id)).copied().collect();
    let mut pagerank_only: Vec<DocId> = pr.keys().filter(|id| !tf.contains_key(id)).copied().collect();
    if !tfidf_only.is_empty() || !pagerank_only.is_empty() {
        tfidf_only.sort_unstable();
        pagerank_only.sort_unstable();
        return Err(IndexError::RankingMismatch { tfidf_only, pagerank_only });
    }

    let total_tf: f64 = tf.values().sum();
    let total_pr: f64 = pr.values().sum();
    let share = |v: f64, total: f64| if total > 0.0 { v / total } else { 0.0 };

    let mut ids: Vec<DocId> = tf.keys().copied().collect();
    ids.sort_unstable();
    Ok(PostingsList::from_entries(
        ids.into_iter()
            .map(|id| {
                let score = TFIDF_WEIGHT * share(tf[&id], total_tf) + PAGERANK_WEIGHT * share(pr[&id], total_pr);
                PostingsEntry::scored(id, score)
            })
            .collect(),
    ))
}
