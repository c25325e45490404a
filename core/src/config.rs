use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::IndexError;

/// Default slot count of the single-segment dictionary.
pub const SINGLE_TABLE_SIZE: u64 = 611_953;
/// Default slot count of the scalable index's final dictionary.
pub const SCALABLE_TABLE_SIZE: u64 = 3_559_999;
/// Distinct terms collected in memory before a scalable build flushes.
pub const FLUSH_THRESHOLD: usize = 350_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Everything collected in memory, written once at the end.
    #[default]
    Single,
    /// Sorted segments flushed at a term threshold and merged in the background.
    Scalable,
}

impl FromStr for IndexMode {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(IndexMode::Single),
            "scalable" => Ok(IndexMode::Scalable),
            _ => Err(IndexError::UnknownOption { kind: "index mode", value: s.to_string() }),
        }
    }
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexMode::Single => f.write_str("single"),
            IndexMode::Scalable => f.write_str("scalable"),
        }
    }
}

/// Construction parameters of a persistent index.
///
/// `table_size` must stay well above the number of distinct terms: the
/// on-disk dictionary is an open-addressing table and refuses inserts once
/// every slot is taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub mode: IndexMode,
    pub table_size: u64,
    pub flush_threshold: usize,
}

impl IndexConfig {
    pub fn single() -> Self {
        Self { mode: IndexMode::Single, table_size: SINGLE_TABLE_SIZE, flush_threshold: FLUSH_THRESHOLD }
    }

    pub fn scalable() -> Self {
        Self { mode: IndexMode::Scalable, table_size: SCALABLE_TABLE_SIZE, flush_threshold: FLUSH_THRESHOLD }
    }

    pub fn for_mode(mode: IndexMode) -> Self {
        match mode {
            IndexMode::Single => Self::single(),
            IndexMode::Scalable => Self::scalable(),
        }
    }

    pub fn with_table_size(mut self, table_size: u64) -> Self {
        self.table_size = table_size;
        self
    }

    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold;
        self
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Scalable".parse::<IndexMode>().unwrap(), IndexMode::Scalable);
        assert!("both".parse::<IndexMode>().is_err());
    }

    #[test]
    fn defaults_follow_mode() {
        assert_eq!(IndexConfig::for_mode(IndexMode::Single).table_size, SINGLE_TABLE_SIZE);
        assert_eq!(IndexConfig::for_mode(IndexMode::Scalable).table_size, SCALABLE_TABLE_SIZE);
    }
}
