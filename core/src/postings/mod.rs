//! Postings model shared by the storage engine, the query engine and the
//! link analyzer.
//!
//! A [`PostingsList`] is kept sorted ascending by document id while it is
//! being built, merged or intersected. Only ranked results are re-sorted by
//! descending score, as a final step.
//!
//! The textual encoding used on disk is `docID:pos1,pos2,...` per entry,
//! entries joined by `-`.

mod algebra;

pub use algebra::{intersect, merge_positions, union, union_scored};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::{IndexError, Result};

pub type DocId = u32;
pub type Position = u32;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostingsEntry {
    pub doc_id: DocId,
    pub score: f64,
    /// Ascending, one per occurrence of the term in the document.
    pub positions: Vec<Position>,
}

impl PostingsEntry {
    pub fn new(doc_id: DocId, position: Position) -> Self {
        Self { doc_id, score: 0.0, positions: vec![position] }
    }

    pub fn with_positions(doc_id: DocId, positions: Vec<Position>) -> Self {
        Self { doc_id, score: 0.0, positions }
    }

    pub fn scored(doc_id: DocId, score: f64) -> Self {
        Self { doc_id, score, positions: Vec::new() }
    }

    pub fn term_frequency(&self) -> usize {
        self.positions.len()
    }

    fn add_position(&mut self, position: Position) {
        match self.positions.last() {
            None => self.positions.push(position),
            Some(&last) if last < position => self.positions.push(position),
            Some(_) => {
                if let Err(at) = self.positions.binary_search(&position) {
                    self.positions.insert(at, position);
                }
            }
        }
    }
}

impl fmt::Display for PostingsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.doc_id)?;
        for (i, p) in self.positions.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{p}")?;
        }
        Ok(())
    }
}

impl FromStr for PostingsEntry {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        let (doc, positions) = s
            .split_once(':')
            .ok_or_else(|| IndexError::MalformedRecord(format!("postings entry without ':' in {s:?}")))?;
        let doc_id = doc
            .parse()
            .map_err(|_| IndexError::MalformedRecord(format!("bad doc id {doc:?}")))?;
        let positions = positions
            .split(',')
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.parse()
                    .map_err(|_| IndexError::MalformedRecord(format!("bad position {p:?} for doc {doc_id}")))
            })
            .collect::<Result<Vec<Position>>>()?;
        Ok(Self::with_positions(doc_id, positions))
    }
}

/// Ordered sequence of postings entries with a query-term weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingsList {
    entries: Vec<PostingsEntry>,
    pub weight: f64,
}

impl Default for PostingsList {
    fn default() -> Self {
        Self { entries: Vec::new(), weight: 1.0 }
    }
}

impl PostingsList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<PostingsEntry>) -> Self {
        Self { entries, weight: 1.0 }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&PostingsEntry> {
        self.entries.get(i)
    }

    pub fn entries(&self) -> &[PostingsEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<PostingsEntry> {
        self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PostingsEntry> {
        self.entries.iter()
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.entries.iter().map(|e| e.doc_id)
    }

    /// Records one occurrence of the term. Repeated occurrences in the same
    /// document extend that document's positions instead of adding an entry.
    pub fn add_occurrence(&mut self, doc_id: DocId, position: Position) {
        match self.entries.last_mut() {
            Some(last) if last.doc_id == doc_id => last.add_position(position),
            Some(last) if last.doc_id > doc_id => {
                match self.entries.binary_search_by_key(&doc_id, |e| e.doc_id) {
                    Ok(at) => self.entries[at].add_position(position),
                    Err(at) => self.entries.insert(at, PostingsEntry::new(doc_id, position)),
                }
            }
            _ => self.entries.push(PostingsEntry::new(doc_id, position)),
        }
    }

    /// Appends an entry; the caller keeps the docID order.
    pub fn push(&mut self, entry: PostingsEntry) {
        self.entries.push(entry);
    }

    pub fn extend_from_slice(&mut self, entries: &[PostingsEntry]) {
        self.entries.extend_from_slice(entries);
    }

    /// Re-sorts into ranked form: descending score, stable on ties.
    pub fn sort_by_score(&mut self) {
        self.entries
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    }

    pub fn sort_by_doc_id(&mut self) {
        self.entries.sort_by_key(|e| e.doc_id);
    }
}

impl<'a> IntoIterator for &'a PostingsList {
    type Item = &'a PostingsEntry;
    type IntoIter = std::slice::Iter<'a, PostingsEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for PostingsList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

impl FromStr for PostingsList {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        let entries = s
            .split('-')
            .filter(|e| e.contains(':'))
            .map(str::parse)
            .collect::<Result<Vec<PostingsEntry>>>()?;
        Ok(Self::from_entries(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_occurrences_extend_one_entry() {
        let mut list = PostingsList::new();
        list.add_occurrence(3, 0);
        list.add_occurrence(3, 4);
        list.add_occurrence(7, 1);
        assert_eq!(list.len(), 2);
        assert_eq!(list.entries()[0].positions, vec![0, 4]);
        assert_eq!(list.entries()[1].positions, vec![1]);
    }

    #[test]
    fn late_occurrence_keeps_doc_order() {
        let mut list = PostingsList::new();
        list.add_occurrence(5, 2);
        list.add_occurrence(9, 0);
        list.add_occurrence(5, 1);
        list.add_occurrence(2, 8);
        let docs: Vec<DocId> = list.doc_ids().collect();
        assert_eq!(docs, vec![2, 5, 9]);
        assert_eq!(list.entries()[1].positions, vec![1, 2]);
    }

    #[test]
    fn encodes_in_wire_format() {
        let mut list = PostingsList::new();
        list.add_occurrence(1, 0);
        list.add_occurrence(1, 5);
        list.add_occurrence(4, 2);
        assert_eq!(list.to_string(), "1:0,5-4:2");
    }

    #[test]
    fn decodes_wire_format() {
        let list: PostingsList = "12:3,9-40:0".parse().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.entries()[0], PostingsEntry::with_positions(12, vec![3, 9]));
        assert_eq!(list.entries()[1].doc_id, 40);
        assert_eq!(list.weight, 1.0);
    }

    #[test]
    fn rejects_garbage_positions() {
        let err = "1:0,x".parse::<PostingsList>().unwrap_err();
        assert!(matches!(err, IndexError::MalformedRecord(_)));
    }

    #[test]
    fn ranked_sort_is_descending() {
        let mut list = PostingsList::from_entries(vec![
            PostingsEntry::scored(1, 0.2),
            PostingsEntry::scored(2, 0.9),
            PostingsEntry::scored(3, 0.5),
        ]);
        list.sort_by_score();
        let docs: Vec<DocId> = list.doc_ids().collect();
        assert_eq!(docs, vec![2, 3, 1]);
    }
}
