use std::collections::{BTreeMap, HashMap};

use crate::DocId;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub name: String,
    /// Number of tokens.
    pub length: u32,
}

/// Per-document metadata owned by an index: name, length, Euclidean norm
/// and PageRank value.
#[derive(Debug, Clone, Default)]
pub struct DocumentTable {
    docs: BTreeMap<DocId, Document>,
    norms: HashMap<DocId, f64>,
    pageranks: HashMap<DocId, f64>,
}

/// Last path component, accepting either separator.
pub fn file_name(name: &str) -> &str {
    name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name)
}

impl DocumentTable {
    pub fn add(&mut self, doc_id: DocId, name: impl Into<String>, length: u32) {
        self.docs.insert(doc_id, Document { name: name.into(), length });
    }

    pub fn get(&self, doc_id: DocId) -> Option<&Document> {
        self.docs.get(&doc_id)
    }

    pub fn name(&self, doc_id: DocId) -> Option<&str> {
        self.docs.get(&doc_id).map(|d| d.name.as_str())
    }

    pub fn length(&self, doc_id: DocId) -> Option<u32> {
        self.docs.get(&doc_id).map(|d| d.length)
    }

    pub fn norm(&self, doc_id: DocId) -> Option<f64> {
        self.norms.get(&doc_id).copied()
    }

    pub fn norms(&self) -> &HashMap<DocId, f64> {
        &self.norms
    }

    pub fn set_norms(&mut self, norms: HashMap<DocId, f64>) {
        self.norms = norms;
    }

    /// PageRank of a document; 0 when none was recorded.
    pub fn pagerank(&self, doc_id: DocId) -> f64 {
        self.pageranks.get(&doc_id).copied().unwrap_or(0.0)
    }

    pub fn set_pageranks(&mut self, ranks: HashMap<DocId, f64>) {
        self.pageranks = ranks;
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocId, &Document)> {
        self.docs.iter().map(|(id, d)| (*id, d))
    }

    pub fn clear(&mut self) {
        self.docs.clear();
    }

    /// Maps each document's file name (last path component) to its id.
    pub fn ids_by_file_name(&self) -> HashMap<String, DocId> {
        self.docs
            .iter()
            .map(|(id, d)| (file_name(&d.name).to_string(), *id))
            .collect()
    }
}
