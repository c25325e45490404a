//! Query evaluation: boolean intersection, phrase adjacency and ranked
//! retrieval by tf-idf, PageRank, HITS or a tf-idf/PageRank mix.

mod query;
mod searcher;

pub use query::{NormalizationType, Query, QueryTerm, QueryType, RankingType};
pub use searcher::{combine_rankings, intersect_all, phrase, Searcher, PAGERANK_WEIGHT, TFIDF_WEIGHT};
