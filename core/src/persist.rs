//! Side files of a persisted index: document info, Euclidean norms,
//! PageRank values and the build meta file.
//!
//! All text side files are read back in full on open. A missing file means
//! "nothing stored yet" and loads as empty.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::config::IndexMode;
use crate::storage::DocumentTable;
use crate::tokenizer::TokenizerOptions;
use crate::{DocId, IndexError, Result};

pub const META_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
    #[serde(default)]
    pub mode: IndexMode,
    pub table_size: u64,
    #[serde(default)]
    pub flush_threshold: usize,
    /// Tokenizer the corpus was indexed with; queries must use the same.
    #[serde(default)]
    pub tokenizer: TokenizerOptions,
}

/// File layout of one index directory.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn dictionary(&self) -> PathBuf { self.root.join("dictionary") }
    pub fn data(&self) -> PathBuf { self.root.join("data") }
    pub fn doc_info(&self) -> PathBuf { self.root.join("docInfo") }
    pub fn euclidean(&self) -> PathBuf { self.root.join("euclidean.txt") }
    pub fn pagerank(&self) -> PathBuf { self.root.join("pageranks.txt") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    /// Freshly flushed batch `step` of a scalable build.
    pub fn segment(&self, step: u32) -> PathBuf { self.root.join(format!("data{step}")) }
    /// Running merged accumulator after merge step `step`.
    pub fn merged(&self, step: u32) -> PathBuf { self.root.join(format!("dataM{step}")) }
}

fn open_existing(path: &Path) -> Result<Option<BufReader<File>>> {
    match File::open(path) {
        Ok(f) => Ok(Some(BufReader::new(f))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Deletes every file a previous build left behind in `paths.root`.
pub fn clear_index_files(paths: &IndexPaths) -> Result<()> {
    create_dir_all(&paths.root)?;
    for p in [paths.dictionary(), paths.data(), paths.doc_info(), paths.euclidean(), paths.pagerank(), paths.meta()] {
        remove_if_exists(&p)?;
    }
    Ok(())
}

fn write_doc_lines<W: Write>(out: &mut W, docs: &DocumentTable) -> Result<()> {
    for (doc_id, doc) in docs.iter() {
        writeln!(out, "{};{};{}", doc_id, doc.name, doc.length)?;
    }
    Ok(())
}

/// Writes `docID;docName;docLength` lines, replacing any previous file.
pub fn save_doc_info(paths: &IndexPaths, docs: &DocumentTable) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut out = BufWriter::new(File::create(paths.doc_info())?);
    write_doc_lines(&mut out, docs)?;
    out.flush()?;
    Ok(())
}

/// Appends the documents of one flushed batch.
pub fn append_doc_info(paths: &IndexPaths, docs: &DocumentTable) -> Result<()> {
    create_dir_all(&paths.root)?;
    let f = OpenOptions::new().create(true).append(true).open(paths.doc_info())?;
    let mut out = BufWriter::new(f);
    write_doc_lines(&mut out, docs)?;
    out.flush()?;
    Ok(())
}

pub fn load_doc_info(paths: &IndexPaths, docs: &mut DocumentTable) -> Result<()> {
    let file = paths.doc_info();
    let Some(reader) = open_existing(&file)? else { return Ok(()) };
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let (id, rest) = line
            .split_once(';')
            .ok_or_else(|| IndexError::format(&file, n + 1, "expected docID;name;length"))?;
        let (name, length) = rest
            .rsplit_once(';')
            .ok_or_else(|| IndexError::format(&file, n + 1, "expected docID;name;length"))?;
        let doc_id: DocId = id.parse().map_err(|_| IndexError::format(&file, n + 1, "bad doc id"))?;
        let length: u32 = length.parse().map_err(|_| IndexError::format(&file, n + 1, "bad length"))?;
        docs.add(doc_id, name, length);
    }
    Ok(())
}

fn save_values(path: &Path, values: &HashMap<DocId, f64>, sep: char) -> Result<()> {
    let mut sorted: Vec<(&DocId, &f64)> = values.iter().collect();
    sorted.sort_by_key(|(id, _)| **id);
    let mut out = BufWriter::new(File::create(path)?);
    for (id, v) in sorted {
        writeln!(out, "{id}{sep}{v}")?;
    }
    out.flush()?;
    Ok(())
}

fn load_values(path: &Path, sep: char) -> Result<HashMap<DocId, f64>> {
    let mut values = HashMap::new();
    let Some(reader) = open_existing(path)? else { return Ok(values) };
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let (id, v) = line
            .split_once(sep)
            .ok_or_else(|| IndexError::format(path, n + 1, format!("expected docID{sep}value")))?;
        let id: DocId = id.trim().parse().map_err(|_| IndexError::format(path, n + 1, "bad doc id"))?;
        let v: f64 = v.trim().parse().map_err(|_| IndexError::format(path, n + 1, "bad value"))?;
        values.insert(id, v);
    }
    Ok(values)
}

/// Euclidean norms as `docID:normValue` lines.
pub fn save_norms(paths: &IndexPaths, norms: &HashMap<DocId, f64>) -> Result<()> {
    save_values(&paths.euclidean(), norms, ':')
}

pub fn load_norms(paths: &IndexPaths) -> Result<HashMap<DocId, f64>> {
    load_values(&paths.euclidean(), ':')
}

/// PageRank values as `docID,value` lines.
pub fn save_pagerank(path: &Path, ranks: &HashMap<DocId, f64>) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir)?;
    }
    save_values(path, ranks, ',')
}

pub fn load_pagerank(path: &Path) -> Result<HashMap<DocId, f64>> {
    load_values(path, ',')
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<Option<MetaFile>> {
    let Some(reader) = open_existing(&paths.meta())? else { return Ok(None) };
    let meta: MetaFile = serde_json::from_reader(reader)?;
    Ok(Some(meta))
}

/// Loads document info, norms and (when present) PageRank values.
pub fn load_document_table(paths: &IndexPaths) -> Result<DocumentTable> {
    let mut docs = DocumentTable::default();
    load_doc_info(paths, &mut docs)?;
    docs.set_norms(load_norms(paths)?);
    docs.set_pageranks(load_pagerank(&paths.pagerank())?);
    Ok(docs)
}
