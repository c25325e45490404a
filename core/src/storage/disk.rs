use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use super::dictionary::{probe_sequence, DiskDictionary, Slot, SlotLayout};
use super::norms::NormAccumulator;
use super::segment::{split_record, SegmentReader};
use crate::postings::PostingsList;
use crate::{DocId, Result};

/// Random-access reader over the data file.
pub struct DataFile {
    layout: SlotLayout,
    file: Mutex<File>,
}

impl DataFile {
    pub fn open(path: &Path, layout: SlotLayout) -> Result<Option<Self>> {
        match File::open(path) {
            Ok(f) => Ok(Some(Self { layout, file: Mutex::new(f) })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the record a slot points at. Single-segment records are sized
    /// by the slot; scalable records carry a 4-byte length prefix.
    pub fn read(&self, slot: Slot) -> Result<Vec<u8>> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(slot.ptr))?;
        let size = match self.layout {
            SlotLayout::PointerAndSize => slot.size as usize,
            SlotLayout::PointerOnly => {
                let mut len = [0u8; 4];
                file.read_exact(&mut len)?;
                u32::from_be_bytes(len) as usize
            }
        };
        let mut payload = vec![0u8; size];
        file.read_exact(&mut payload)?;
        Ok(payload)
    }
}

/// Read side of a persisted index: dictionary plus data file.
pub struct DiskIndex {
    dictionary: DiskDictionary,
    data: DataFile,
}

impl DiskIndex {
    /// `None` when either file is missing, i.e. nothing was built yet.
    pub fn open(dictionary: &Path, data: &Path, layout: SlotLayout) -> Result<Option<Self>> {
        let Some(dictionary) = DiskDictionary::open(dictionary, layout)? else { return Ok(None) };
        let Some(data) = DataFile::open(data, layout)? else { return Ok(None) };
        Ok(Some(Self { dictionary, data }))
    }

    /// Probes from the term's home slot until the stored term matches or an
    /// empty slot ends the chain.
    pub fn get_postings(&self, term: &str) -> Result<Option<PostingsList>> {
        let mut probes = 0u64;
        for idx in probe_sequence(term, self.dictionary.table_size()) {
            let slot = self.dictionary.read_slot(idx)?;
            if slot.is_empty() {
                break;
            }
            let payload = self.data.read(slot)?;
            let (stored, postings) = split_record(&payload)?;
            if stored == term {
                tracing::trace!(term, probes, "dictionary hit");
                return Ok(Some(postings.parse()?));
            }
            probes += 1;
        }
        tracing::trace!(term, probes, "dictionary miss");
        Ok(None)
    }

    /// Visits every stored postings list once.
    pub fn for_each_list<F>(&self, data_path: &Path, mut visit: F) -> Result<()>
    where
        F: FnMut(&str, PostingsList),
    {
        match self.dictionary.layout() {
            SlotLayout::PointerAndSize => {
                for slot in self.dictionary.occupied_slots()? {
                    let payload = self.data.read(slot)?;
                    let (term, postings) = split_record(&payload)?;
                    visit(term, postings.parse()?);
                }
            }
            SlotLayout::PointerOnly => {
                for record in SegmentReader::open(data_path)? {
                    let record = record?;
                    let (term, postings) = record.split()?;
                    visit(term, postings.parse()?);
                }
            }
        }
        Ok(())
    }

    /// Euclidean tf-idf norm of every document, over `num_docs` documents.
    pub fn compute_norms(&self, data_path: &Path, num_docs: usize) -> Result<HashMap<DocId, f64>> {
        let mut acc = NormAccumulator::new(num_docs);
        self.for_each_list(data_path, |_, list| acc.add(&list))?;
        Ok(acc.finish())
    }
}
