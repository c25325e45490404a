//! Indexing and ranking engine: a persistent hash-addressed inverted index,
//! boolean/phrase/ranked query evaluation, and link-analysis ranking
//! (PageRank and HITS).

pub mod config;
pub mod error;
pub mod link;
pub mod persist;
pub mod postings;
pub mod search;
pub mod storage;
pub mod tokenizer;

pub use config::{IndexConfig, IndexMode};
pub use error::{IndexError, Result};
pub use postings::{DocId, Position, PostingsEntry, PostingsList};
pub use storage::{create_index, open_index, DocumentTable, Index};
