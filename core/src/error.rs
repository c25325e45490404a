use std::path::PathBuf;

use thiserror::Error;

use crate::DocId;

/// Errors surfaced by the storage engine, the link analyzer and the query engine.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed line {line} in {file}: {reason}")]
    Format {
        file: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("dictionary table with {table_size} slots is full")]
    DictionaryFull { table_size: u64 },

    #[error("merge task failed: {0}")]
    MergeTask(String),

    #[error(
        "tf-idf and pagerank rankings cover different documents \
         (tf-idf only: {tfidf_only:?}, pagerank only: {pagerank_only:?})"
    )]
    RankingMismatch {
        tfidf_only: Vec<DocId>,
        pagerank_only: Vec<DocId>,
    },

    #[error("hits ranking requested but no link graph is loaded")]
    NoLinkGraph,

    #[error("meta file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown {kind}: {value}")]
    UnknownOption { kind: &'static str, value: String },

    #[error("invalid token pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub(crate) fn format(file: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        IndexError::Format {
            file: file.into(),
            line,
            reason: reason.into(),
        }
    }
}
