//! Durable term → postings storage.
//!
//! Three implementations share the [`Index`] trait:
//! - [`MemoryIndex`]: a plain hash map, nothing persisted.
//! - [`PersistentHashedIndex`]: collects everything in memory and writes one
//!   data file plus an open-addressing dictionary at the end.
//! - [`ScalableHashedIndex`]: flushes sorted segments at a term threshold and
//!   compacts them with one background merge at a time.

mod dictionary;
mod disk;
mod documents;
mod memory;
mod norms;
pub mod segment;
mod scalable;
mod single;

pub use dictionary::{home_slot, probe_sequence, string_hash, DictionaryBuilder, DiskDictionary, Slot, SlotLayout};
pub use disk::{DataFile, DiskIndex};
pub use documents::{file_name, Document, DocumentTable};
pub use memory::MemoryIndex;
pub use norms::NormAccumulator;
pub use scalable::{BuildSession, ScalableHashedIndex};
pub use single::PersistentHashedIndex;

use std::path::Path;

use crate::config::{IndexConfig, IndexMode};
use crate::persist::{load_meta, IndexPaths};
use crate::postings::{PostingsList, Position};
use crate::{DocId, Result};

/// Contract shared by every index implementation.
///
/// Construction is single-writer: `insert`/`add_document` for every token and
/// document, then `finalize`, then `compute_norms`. Lookups are read-only and
/// only meaningful once the index is finalized.
pub trait Index: Send + Sync {
    /// Records one occurrence of `term` at `position` in `doc_id`.
    fn insert(&mut self, term: &str, doc_id: DocId, position: Position) -> Result<()>;

    fn add_document(&mut self, doc_id: DocId, name: &str, length: u32);

    /// Postings of `term`, or `None` when the term is not in the dictionary.
    fn get_postings(&self, term: &str) -> Result<Option<PostingsList>>;

    /// Computes and stores the Euclidean tf-idf norm of every document.
    fn compute_norms(&mut self) -> Result<()>;

    /// Flushes in-memory state and builds the on-disk dictionary.
    fn finalize(&mut self) -> Result<()>;

    fn documents(&self) -> &DocumentTable;

    fn documents_mut(&mut self) -> &mut DocumentTable;

    fn num_docs(&self) -> usize {
        self.documents().len()
    }
}

/// Creates an empty index of the configured mode in `root`, removing any
/// previous build there.
pub fn create_index(root: &Path, config: IndexConfig) -> Result<Box<dyn Index>> {
    Ok(match config.mode {
        IndexMode::Single => Box::new(PersistentHashedIndex::create(root, config)?),
        IndexMode::Scalable => Box::new(ScalableHashedIndex::create(root, config)?),
    })
}

/// Reopens the index in `root`; the build's `meta.json` picks the reader.
/// A directory without one opens as an empty single-segment index.
pub fn open_index(root: &Path) -> Result<Box<dyn Index>> {
    let paths = IndexPaths::new(root);
    let config = match load_meta(&paths)? {
        Some(meta) => IndexConfig::for_mode(meta.mode).with_table_size(meta.table_size),
        None => IndexConfig::single(),
    };
    Ok(match config.mode {
        IndexMode::Single => Box::new(PersistentHashedIndex::open(root, config)?),
        IndexMode::Scalable => Box::new(ScalableHashedIndex::open(root, config)?),
    })
}
