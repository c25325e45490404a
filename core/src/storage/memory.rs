use std::collections::HashMap;

use super::{DocumentTable, Index, NormAccumulator};
use crate::postings::{PostingsList, Position};
use crate::{DocId, Result};

/// Inverted index held entirely in a hash map.
#[derive(Default)]
pub struct MemoryIndex {
    index: HashMap<String, PostingsList>,
    docs: DocumentTable,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&String, &PostingsList)> {
        self.index.iter()
    }

    pub fn num_terms(&self) -> usize {
        self.index.len()
    }
}

impl Index for MemoryIndex {
    fn insert(&mut self, term: &str, doc_id: DocId, position: Position) -> Result<()> {
        match self.index.get_mut(term) {
            Some(list) => list.add_occurrence(doc_id, position),
            None => {
                let mut list = PostingsList::new();
                list.add_occurrence(doc_id, position);
                self.index.insert(term.to_string(), list);
            }
        }
        Ok(())
    }

    fn add_document(&mut self, doc_id: DocId, name: &str, length: u32) {
        self.docs.add(doc_id, name, length);
    }

    fn get_postings(&self, term: &str) -> Result<Option<PostingsList>> {
        Ok(self.index.get(term).cloned())
    }

    fn compute_norms(&mut self) -> Result<()> {
        let mut acc = NormAccumulator::new(self.docs.len());
        for list in self.index.values() {
            acc.add(list);
        }
        self.docs.set_norms(acc.finish());
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }

    fn documents(&self) -> &DocumentTable {
        &self.docs
    }

    fn documents_mut(&mut self) -> &mut DocumentTable {
        &mut self.docs
    }
}
