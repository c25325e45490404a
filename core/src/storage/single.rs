use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::dictionary::{DictionaryBuilder, Slot, SlotLayout};
use super::disk::DiskIndex;
use super::segment::{encode_record, HEADER};
use super::{DocumentTable, Index, NormAccumulator};
use crate::config::IndexConfig;
use crate::persist::{clear_index_files, load_document_table, save_doc_info, save_norms, IndexPaths};
use crate::postings::{PostingsList, Position};
use crate::{DocId, IndexError, Result};

/// Single-segment persistent index.
///
/// Every occurrence is collected in memory. `finalize` appends one
/// `term*postings` record per term to the data file and points a
/// pointer+size dictionary slot at it.
pub struct PersistentHashedIndex {
    paths: IndexPaths,
    table_size: u64,
    index: HashMap<String, PostingsList>,
    docs: DocumentTable,
    disk: Option<DiskIndex>,
}

impl PersistentHashedIndex {
    /// Starts a fresh build in `root`.
    pub fn create(root: &Path, config: IndexConfig) -> Result<Self> {
        let paths = IndexPaths::new(root);
        clear_index_files(&paths)?;
        Ok(Self {
            paths,
            table_size: config.table_size,
            index: HashMap::new(),
            docs: DocumentTable::default(),
            disk: None,
        })
    }

    /// Opens what a previous build left in `root`; an empty directory opens
    /// as an empty index.
    pub fn open(root: &Path, config: IndexConfig) -> Result<Self> {
        let paths = IndexPaths::new(root);
        let docs = load_document_table(&paths)?;
        let disk = DiskIndex::open(&paths.dictionary(), &paths.data(), SlotLayout::PointerAndSize)?;
        if disk.is_none() {
            tracing::info!(root = %root.display(), "no index found, starting empty");
        }
        Ok(Self { paths, table_size: config.table_size, index: HashMap::new(), docs, disk })
    }

    fn write_index(&mut self) -> Result<()> {
        save_doc_info(&self.paths, &self.docs)?;

        let mut data = BufWriter::new(File::create(self.paths.data())?);
        data.write_all(&HEADER)?;
        let mut free = HEADER.len() as u64;
        let mut dictionary = DictionaryBuilder::new(SlotLayout::PointerAndSize, self.table_size);

        let mut terms: Vec<&String> = self.index.keys().collect();
        terms.sort();
        for term in terms {
            let record = encode_record(term, &self.index[term]);
            let size = u32::try_from(record.len())
                .map_err(|_| IndexError::MalformedRecord(format!("postings of {term:?} exceed 4 GiB")))?;
            data.write_all(record.as_bytes())?;
            dictionary.insert(term, Slot { ptr: free, size })?;
            free += u64::from(size);
        }
        data.flush()?;
        data.get_ref().sync_all()?;

        tracing::info!(terms = dictionary.len(), collisions = dictionary.collisions(), "writing index to disk");
        dictionary.write(&self.paths.dictionary())
    }
}

impl Index for PersistentHashedIndex {
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
        match &self.disk {
            Some(disk) => disk.get_postings(term),
            None => Ok(None),
        }
    }

    /// Uses the in-memory map while it is still populated, otherwise one
    /// pass over the dictionary on disk.
    fn compute_norms(&mut self) -> Result<()> {
        let norms = if !self.index.is_empty() {
            let mut acc = NormAccumulator::new(self.docs.len());
            for list in self.index.values() {
                acc.add(list);
            }
            acc.finish()
        } else if let Some(disk) = &self.disk {
            disk.compute_norms(&self.paths.data(), self.docs.len())?
        } else {
            HashMap::new()
        };
        save_norms(&self.paths, &norms)?;
        self.docs.set_norms(norms);
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        tracing::info!(unique_terms = self.index.len(), "finalizing index");
        self.write_index()?;
        self.index = HashMap::new();
        self.disk = DiskIndex::open(&self.paths.dictionary(), &self.paths.data(), SlotLayout::PointerAndSize)?;
        Ok(())
    }

    fn documents(&self) -> &DocumentTable {
        &self.docs
    }

    fn documents_mut(&mut self) -> &mut DocumentTable {
        &mut self.docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn small() -> IndexConfig {
        IndexConfig::single().with_table_size(101)
    }

    #[test]
    fn data_file_never_uses_offset_zero() {
        let dir = tempdir().unwrap();
        let mut index = PersistentHashedIndex::create(dir.path(), small()).unwrap();
        index.add_document(0, "a.txt", 1);
        index.insert("alpha", 0, 0).unwrap();
        index.finalize().unwrap();

        let data = std::fs::read(dir.path().join("data")).unwrap();
        assert_eq!(&data[1..], b"alpha*0:0");
        let dict = std::fs::read(dir.path().join("dictionary")).unwrap();
        assert_eq!(dict.len(), 101 * 12);
    }

    #[test]
    fn lookups_resolve_colliding_terms() {
        let dir = tempdir().unwrap();
        // one slot per term and a tiny table force long probe chains
        let mut index = PersistentHashedIndex::create(dir.path(), IndexConfig::single().with_table_size(4)).unwrap();
        for (doc, term) in ["w", "x", "y", "z"].iter().enumerate() {
            index.add_document(doc as DocId, term, 1);
            index.insert(term, doc as DocId, 0).unwrap();
        }
        index.finalize().unwrap();
        for (doc, term) in ["w", "x", "y", "z"].iter().enumerate() {
            let list = index.get_postings(term).unwrap().unwrap();
            assert_eq!(list.entries()[0].doc_id, doc as DocId);
        }
        assert!(index.get_postings("v").unwrap().is_none());
    }

    #[test]
    fn overfull_table_fails_finalize() {
        let dir = tempdir().unwrap();
        let mut index = PersistentHashedIndex::create(dir.path(), IndexConfig::single().with_table_size(2)).unwrap();
        for term in ["a", "b", "c"] {
            index.insert(term, 0, 0).unwrap();
        }
        let err = index.finalize().unwrap_err();
        assert!(matches!(err, IndexError::DictionaryFull { .. }));
    }

    #[test]
    fn empty_directory_opens_empty() {
        let dir = tempdir().unwrap();
        let index = PersistentHashedIndex::open(dir.path(), small()).unwrap();
        assert_eq!(index.num_docs(), 0);
        assert!(index.get_postings("anything").unwrap().is_none());
    }
}
