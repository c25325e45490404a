use std::collections::HashMap;

use crate::postings::PostingsList;
use crate::DocId;

/// Accumulates `(tf * idf)^2` per document across postings lists, with
/// `idf = ln(N / df)`.
pub struct NormAccumulator {
    num_docs: usize,
    sums: HashMap<DocId, f64>,
}

impl NormAccumulator {
    pub fn new(num_docs: usize) -> Self {
        Self { num_docs, sums: HashMap::new() }
    }

    pub fn add(&mut self, list: &PostingsList) {
        if list.is_empty() {
            return;
        }
        let idf = (self.num_docs as f64 / list.len() as f64).ln();
        for entry in list {
            let w = entry.term_frequency() as f64 * idf;
            *self.sums.entry(entry.doc_id).or_insert(0.0) += w * w;
        }
    }

    pub fn finish(self) -> HashMap<DocId, f64> {
        self.sums.into_iter().map(|(id, s)| (id, s.sqrt())).collect()
    }
}
