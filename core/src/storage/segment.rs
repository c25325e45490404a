//! Length-prefixed segment files of the scalable index and the two-way merge
//! that compacts them.
//!
//! Layout: one reserved header byte, then records of
//! `u32 big-endian length` + `term*postings` payload, sorted by term.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use crate::postings::{self, PostingsList};
use crate::{IndexError, Result};

/// Bytes reserved at the start of every data file; keeps offset 0 free.
pub const HEADER: [u8; 1] = [0];
pub const TERM_SEPARATOR: u8 = b'*';

/// Builds the `term*postings` payload of one record.
pub fn encode_record(term: &str, list: &PostingsList) -> String {
    format!("{term}*{list}")
}

/// Splits a `term*postings` payload at the last separator; encoded postings
/// never contain one, terms may.
pub fn split_record(payload: &[u8]) -> Result<(&str, &str)> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| IndexError::MalformedRecord(format!("record is not UTF-8: {e}")))?;
    text.rsplit_once('*')
        .ok_or_else(|| IndexError::MalformedRecord(format!("record without term separator: {text:.40}")))
}

#[derive(Debug, Clone)]
pub struct SegmentRecord {
    /// Offset of the length prefix in the file.
    pub offset: u64,
    pub payload: Vec<u8>,
}

impl SegmentRecord {
    pub fn term_bytes(&self) -> &[u8] {
        let end = self
            .payload
            .iter()
            .rposition(|b| *b == TERM_SEPARATOR)
            .unwrap_or(self.payload.len());
        &self.payload[..end]
    }

    pub fn split(&self) -> Result<(&str, &str)> {
        split_record(&self.payload)
    }

    pub fn postings(&self) -> Result<PostingsList> {
        self.split()?.1.parse()
    }
}

pub struct SegmentWriter {
    out: BufWriter<File>,
    offset: u64,
    records: u64,
}

impl SegmentWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(&HEADER)?;
        Ok(Self { out, offset: HEADER.len() as u64, records: 0 })
    }

    /// Appends one payload and returns the offset of its record.
    pub fn write_payload(&mut self, payload: &[u8]) -> Result<u64> {
        let len = u32::try_from(payload.len())
            .map_err(|_| IndexError::MalformedRecord(format!("record of {} bytes is too large", payload.len())))?;
        let at = self.offset;
        self.out.write_all(&len.to_be_bytes())?;
        self.out.write_all(payload)?;
        self.offset += 4 + payload.len() as u64;
        self.records += 1;
        Ok(at)
    }

    pub fn write_record(&mut self, term: &str, list: &PostingsList) -> Result<u64> {
        self.write_payload(encode_record(term, list).as_bytes())
    }

    /// Copies everything `reader` has not yielded yet, verbatim.
    fn append_rest(&mut self, reader: SegmentReader) -> Result<()> {
        let mut inner = reader.reader;
        let copied = io::copy(&mut inner, &mut self.out)?;
        self.offset += copied;
        Ok(())
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn finish(mut self) -> Result<u64> {
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        Ok(self.offset)
    }
}

pub struct SegmentReader {
    reader: BufReader<File>,
    offset: u64,
}

impl SegmentReader {
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut header = [0u8; HEADER.len()];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(IndexError::MalformedRecord(format!("{} has no header", path.display())))
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Self { reader, offset: HEADER.len() as u64 })
    }

    pub fn next_record(&mut self) -> Result<Option<SegmentRecord>> {
        let mut len = [0u8; 4];
        match self.reader.read_exact(&mut len) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_be_bytes(len) as usize;
        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                IndexError::MalformedRecord(format!("truncated record at offset {}", self.offset))
            }
            _ => e.into(),
        })?;
        let record = SegmentRecord { offset: self.offset, payload };
        self.offset += 4 + len as u64;
        Ok(Some(record))
    }
}

impl Iterator for SegmentReader {
    type Item = Result<SegmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Writes an in-memory batch, already sorted by term, as a segment.
pub fn write_segment<'a, I>(path: &Path, batch: I) -> Result<u64>
where
    I: IntoIterator<Item = (&'a String, &'a PostingsList)>,
{
    let mut writer = SegmentWriter::create(path)?;
    for (term, list) in batch {
        writer.write_record(term, list)?;
    }
    let records = writer.records();
    writer.finish()?;
    Ok(records)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub bytes: u64,
    pub shared_terms: u64,
}

/// Two-pointer merge of two sorted segments into `out`. Terms present in
/// both get their postings merged structurally; `older` holds the lower
/// document ids.
pub fn merge_segments(older: &Path, newer: &Path, out: &Path) -> Result<MergeStats> {
    let mut left = SegmentReader::open(older)?;
    let mut right = SegmentReader::open(newer)?;
    let mut writer = SegmentWriter::create(out)?;
    let mut stats = MergeStats::default();

    let mut a = left.next_record()?;
    let mut b = right.next_record()?;
    loop {
        match (a.take(), b.take()) {
            (Some(x), Some(y)) => match x.term_bytes().cmp(y.term_bytes()) {
                Ordering::Equal => {
                    let (term, _) = x.split()?;
                    let merged = postings::union(&x.postings()?, &y.postings()?);
                    writer.write_record(term, &merged)?;
                    stats.shared_terms += 1;
                    a = left.next_record()?;
                    b = right.next_record()?;
                }
                Ordering::Less => {
                    writer.write_payload(&x.payload)?;
                    a = left.next_record()?;
                    b = Some(y);
                }
                Ordering::Greater => {
                    writer.write_payload(&y.payload)?;
                    a = Some(x);
                    b = right.next_record()?;
                }
            },
            (Some(x), None) => {
                writer.write_payload(&x.payload)?;
                writer.append_rest(left)?;
                break;
            }
            (None, Some(y)) => {
                writer.write_payload(&y.payload)?;
                writer.append_rest(right)?;
                break;
            }
            (None, None) => break,
        }
    }
    stats.bytes = writer.finish()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn batch(items: &[(&str, &str)]) -> BTreeMap<String, PostingsList> {
        items
            .iter()
            .map(|(t, p)| (t.to_string(), p.parse().unwrap()))
            .collect()
    }

    fn read_all(path: &Path) -> Vec<(String, String)> {
        SegmentReader::open(path)
            .unwrap()
            .map(|r| {
                let r = r.unwrap();
                let (t, p) = r.split().unwrap();
                (t.to_string(), p.to_string())
            })
            .collect()
    }

    #[test]
    fn first_record_follows_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seg");
        write_segment(&path, &batch(&[("apple", "0:1"), ("pear", "0:2")])).unwrap();
        let mut reader = SegmentReader::open(&path).unwrap();
        let first = reader.next_record().unwrap().unwrap();
        assert_eq!(first.offset, 1);
        assert_eq!(first.term_bytes(), b"apple");
        let second = reader.next_record().unwrap().unwrap();
        assert_eq!(second.offset, 1 + 4 + "apple*0:1".len() as u64);
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn merge_interleaves_and_unions() {
        let dir = tempdir().unwrap();
        let (older, newer, out) = (dir.path().join("a"), dir.path().join("b"), dir.path().join("c"));
        write_segment(&older, &batch(&[("b", "1:0"), ("d", "1:3"), ("e", "2:0")])).unwrap();
        write_segment(&newer, &batch(&[("a", "5:0"), ("d", "1:3,4-6:1"), ("f", "7:2"), ("g", "7:3")])).unwrap();
        let stats = merge_segments(&older, &newer, &out).unwrap();
        assert_eq!(stats.shared_terms, 1);
        assert_eq!(
            read_all(&out),
            vec![
                ("a".to_string(), "5:0".to_string()),
                ("b".to_string(), "1:0".to_string()),
                ("d".to_string(), "1:3,4-6:1".to_string()),
                ("e".to_string(), "2:0".to_string()),
                ("f".to_string(), "7:2".to_string()),
                ("g".to_string(), "7:3".to_string()),
            ]
        );
    }

    #[test]
    fn terms_may_contain_the_separator() {
        let dir = tempdir().unwrap();
        let (older, newer, out) = (dir.path().join("a"), dir.path().join("b"), dir.path().join("c"));
        write_segment(&older, &batch(&[("a*b", "0:1"), ("c", "0:2")])).unwrap();
        write_segment(&newer, &batch(&[("a*b", "1:0"), ("x*", "1:1")])).unwrap();
        let stats = merge_segments(&older, &newer, &out).unwrap();
        assert_eq!(stats.shared_terms, 1);

        let mut reader = SegmentReader::open(&out).unwrap();
        let first = reader.next_record().unwrap().unwrap();
        assert_eq!(first.term_bytes(), b"a*b");
        assert_eq!(
            read_all(&out),
            vec![
                ("a*b".to_string(), "0:1-1:0".to_string()),
                ("c".to_string(), "0:2".to_string()),
                ("x*".to_string(), "1:1".to_string()),
            ]
        );
    }

    #[test]
    fn merge_with_empty_segment_copies_other_side() {
        let dir = tempdir().unwrap();
        let (older, newer, out) = (dir.path().join("a"), dir.path().join("b"), dir.path().join("c"));
        write_segment(&older, &batch(&[])).unwrap();
        write_segment(&newer, &batch(&[("x", "3:0"), ("y", "3:1")])).unwrap();
        merge_segments(&older, &newer, &out).unwrap();
        assert_eq!(read_all(&out).len(), 2);
    }

    #[test]
    fn truncated_record_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seg");
        let mut bytes = HEADER.to_vec();
        bytes.extend_from_slice(&10u32.to_be_bytes());
        bytes.extend_from_slice(b"ab*");
        std::fs::write(&path, bytes).unwrap();
        let err = SegmentReader::open(&path).unwrap().next_record().unwrap_err();
        assert!(matches!(err, IndexError::MalformedRecord(_)));
    }
}
