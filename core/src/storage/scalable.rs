use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::thread::{self, JoinHandle};

use super::dictionary::{DictionaryBuilder, Slot, SlotLayout};
use super::disk::DiskIndex;
use super::segment::{merge_segments, write_segment, MergeStats, SegmentReader};
use super::{DocumentTable, Index};
use crate::config::IndexConfig;
use crate::persist::{append_doc_info, clear_index_files, load_document_table, save_norms, IndexPaths};
use crate::postings::{PostingsList, Position};
use crate::{DocId, IndexError, Result};

/// Counters of one scalable build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSession {
    /// Batches flushed so far; batch 0 seeds the merged accumulator.
    pub segments_written: u32,
    /// Step of the most recently dispatched merge.
    pub merge_step: u32,
    /// Distinct terms collected since the last flush.
    pub terms_in_batch: usize,
    pub terms_flushed: u64,
}

/// Background compaction of `dataM{step-1}` and `data{step}` into `dataM{step}`.
struct MergeTask {
    step: u32,
    handle: JoinHandle<Result<MergeStats>>,
}

impl MergeTask {
    fn spawn(paths: IndexPaths, step: u32) -> Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("merge-{step}"))
            .spawn(move || {
                let older = paths.merged(step - 1);
                let newer = paths.segment(step);
                let stats = merge_segments(&older, &newer, &paths.merged(step))?;
                fs::remove_file(&older)?;
                fs::remove_file(&newer)?;
                tracing::info!(step, bytes = stats.bytes, shared_terms = stats.shared_terms, "merge done");
                Ok(stats)
            })?;
        Ok(Self { step, handle })
    }

    fn join(self) -> Result<MergeStats> {
        let step = self.step;
        self.handle
            .join()
            .map_err(|_| IndexError::MergeTask(format!("merge step {step} panicked")))?
    }
}

fn is_segment_file(name: &str) -> bool {
    let Some(rest) = name.strip_prefix("data") else { return false };
    let rest = rest.strip_prefix('M').unwrap_or(rest);
    !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())
}

/// Merge-based persistent index for corpora that do not fit in memory.
///
/// Terms collect in a sorted map. At `flush_threshold` distinct terms the
/// map is written as a segment and merged into the running accumulator on a
/// background thread; at most one merge is in flight and the previous one is
/// joined before the next is dispatched. `finalize` flushes the rest, waits
/// for the last merge, renames the accumulator to the data file and builds a
/// pointer-only dictionary in one sequential scan.
pub struct ScalableHashedIndex {
    paths: IndexPaths,
    config: IndexConfig,
    index: BTreeMap<String, PostingsList>,
    batch_docs: DocumentTable,
    docs: DocumentTable,
    session: BuildSession,
    merge: Option<MergeTask>,
    disk: Option<DiskIndex>,
}

impl ScalableHashedIndex {
    pub fn create(root: &Path, config: IndexConfig) -> Result<Self> {
        let paths = IndexPaths::new(root);
        clear_index_files(&paths)?;
        for entry in fs::read_dir(&paths.root)? {
            let entry = entry?;
            if entry.file_name().to_str().is_some_and(is_segment_file) {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(Self {
            paths,
            config,
            index: BTreeMap::new(),
            batch_docs: DocumentTable::default(),
            docs: DocumentTable::default(),
            session: BuildSession::default(),
            merge: None,
            disk: None,
        })
    }

    pub fn open(root: &Path, config: IndexConfig) -> Result<Self> {
        let paths = IndexPaths::new(root);
        let docs = load_document_table(&paths)?;
        let disk = DiskIndex::open(&paths.dictionary(), &paths.data(), SlotLayout::PointerOnly)?;
        Ok(Self {
            paths,
            config,
            index: BTreeMap::new(),
            batch_docs: DocumentTable::default(),
            docs,
            session: BuildSession::default(),
            merge: None,
            disk,
        })
    }

    pub fn session(&self) -> &BuildSession {
        &self.session
    }

    /// Writes the current batch as a segment and dispatches its merge.
    fn flush(&mut self) -> Result<()> {
        let step = self.session.segments_written;
        let target = if step == 0 { self.paths.merged(0) } else { self.paths.segment(step) };
        write_segment(&target, &self.index)?;
        append_doc_info(&self.paths, &self.batch_docs)?;

        self.session.terms_flushed += self.index.len() as u64;
        tracing::info!(step, terms = self.index.len(), total = self.session.terms_flushed, "segment flushed");
        self.index.clear();
        self.batch_docs.clear();
        self.session.terms_in_batch = 0;

        if step > 0 {
            // the accumulator this merge reads is the previous merge's output
            if let Some(previous) = self.merge.take() {
                previous.join()?;
            }
            self.merge = Some(MergeTask::spawn(self.paths.clone(), step)?);
            self.session.merge_step = step;
        }
        self.session.segments_written += 1;
        Ok(())
    }

    fn write_dictionary(&self) -> Result<u64> {
        let mut dictionary = DictionaryBuilder::new(SlotLayout::PointerOnly, self.config.table_size);
        for record in SegmentReader::open(&self.paths.data())? {
            let record = record?;
            let (term, _) = record.split()?;
            dictionary.insert(term, Slot { ptr: record.offset, size: 0 })?;
        }
        let terms = dictionary.len();
        dictionary.write(&self.paths.dictionary())?;
        Ok(terms)
    }
}

impl Index for ScalableHashedIndex {
    fn insert(&mut self, term: &str, doc_id: DocId, position: Position) -> Result<()> {
        match self.index.get_mut(term) {
            Some(list) => list.add_occurrence(doc_id, position),
            None => {
                let mut list = PostingsList::new();
                list.add_occurrence(doc_id, position);
                self.index.insert(term.to_string(), list);
                self.session.terms_in_batch += 1;
                if self.session.terms_in_batch >= self.config.flush_threshold {
                    tracing::debug!(threshold = self.config.flush_threshold, "term threshold reached");
                    self.flush()?;
                }
            }
        }
        Ok(())
    }

    fn add_document(&mut self, doc_id: DocId, name: &str, length: u32) {
        self.batch_docs.add(doc_id, name, length);
    }

    fn get_postings(&self, term: &str) -> Result<Option<PostingsList>> {
        match &self.disk {
            Some(disk) => disk.get_postings(term),
            None => Ok(None),
        }
    }

    fn compute_norms(&mut self) -> Result<()> {
        let Some(disk) = &self.disk else {
            tracing::warn!("norms need a finalized index, skipping");
            return Ok(());
        };
        let norms = disk.compute_norms(&self.paths.data(), self.docs.len())?;
        save_norms(&self.paths, &norms)?;
        self.docs.set_norms(norms);
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if !self.index.is_empty() || !self.batch_docs.is_empty() || self.session.segments_written == 0 {
            self.flush()?;
        }
        if let Some(last) = self.merge.take() {
            last.join()?;
        }
        let last = self.session.segments_written - 1;
        fs::rename(self.paths.merged(last), self.paths.data())?;

        let terms = self.write_dictionary()?;
        self.docs = load_document_table(&self.paths)?;
        self.disk = DiskIndex::open(&self.paths.dictionary(), &self.paths.data(), SlotLayout::PointerOnly)?;
        tracing::info!(terms, docs = self.docs.len(), segments = self.session.segments_written, "scalable index finalized");
        Ok(())
    }

    fn documents(&self) -> &DocumentTable {
        &self.docs
    }

    fn documents_mut(&mut self) -> &mut DocumentTable {
        &mut self.docs
    }
}

impl Drop for ScalableHashedIndex {
    fn drop(&mut self) {
        if let Some(task) = self.merge.take() {
            if let Err(e) = task.join() {
                tracing::error!(error = %e, "pending merge failed");
            }
        }
    }
}
