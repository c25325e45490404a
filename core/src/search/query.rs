use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::IndexError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTerm {
    pub term: String,
    pub weight: f64,
}

/// Ordered query terms with per-term weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub terms: Vec<QueryTerm>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whitespace-separated words, each with weight 1.
    pub fn parse(text: &str) -> Self {
        Self::from_terms(text.split_whitespace())
    }

    /// Builds a query from already normalized terms, each with weight 1.
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|t| QueryTerm { term: t.into(), weight: 1.0 })
                .collect(),
        }
    }

    pub fn push(&mut self, term: impl Into<String>, weight: f64) {
        self.terms.push(QueryTerm { term: term.into(), weight });
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Manhattan length: sum of absolute term weights.
    pub fn length(&self) -> f64 {
        self.terms.iter().map(|t| t.weight.abs()).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryTerm> {
        self.terms.iter()
    }
}

macro_rules! selector {
    ($name:ident, $kind:literal, { $($(#[$attr:meta])* $variant:ident => $text:literal $(| $alias:literal)*),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($(#[$attr])* $variant),+
        }

        impl FromStr for $name {
            type Err = IndexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($text $(| $alias)* => Ok($name::$variant),)+
                    _ => Err(IndexError::UnknownOption { kind: $kind, value: s.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $($name::$variant => $text),+
                })
            }
        }
    };
}

selector!(QueryType, "query type", {
    #[default]
    Intersection => "intersection",
    Phrase => "phrase",
    Ranked => "ranked",
});

selector!(RankingType, "ranking type", {
    #[default]
    TfIdf => "tfidf" | "tf-idf" | "tf_idf",
    PageRank => "pagerank",
    Hits => "hits",
    Combination => "combination",
});

selector!(NormalizationType, "normalization type", {
    #[default]
    Number => "number" | "length",
    Euclidean => "euclidean",
});
