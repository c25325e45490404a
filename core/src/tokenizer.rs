use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

use crate::postings::Position;
use crate::Result;

const WORD: &str = r"[\p{L}\p{N}][\p{L}\p{N}_']*";

lazy_static! {
    static ref WORD_ONLY: Regex = Regex::new(&format!("(?P<word>{WORD})")).expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerOptions {
    pub stem: bool,
    pub remove_stopwords: bool,
    /// Regexes for special tokens (e-mail addresses, URLs, ...) that are kept
    /// whole. Tried before ordinary words, in order.
    pub patterns: Vec<String>,
}

/// Turns text into `(term, position)` pairs: NFKC normalisation, lowercase,
/// then special patterns and words. Positions count every matched token,
/// including removed stopwords.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    options: TokenizerOptions,
    regex: Regex,
}

impl Tokenizer {
    pub fn new(options: TokenizerOptions) -> Result<Self> {
        let mut alternatives: Vec<String> = Vec::new();
        if !options.patterns.is_empty() {
            let special = options
                .patterns
                .iter()
                .map(|p| format!("(?:{p})"))
                .collect::<Vec<_>>()
                .join("|");
            alternatives.push(format!("(?P<special>{special})"));
        }
        alternatives.push(format!("(?P<word>{WORD})"));
        let regex = Regex::new(&alternatives.join("|"))?;
        Ok(Self { options, regex })
    }

    pub fn options(&self) -> &TokenizerOptions {
        &self.options
    }

    pub fn tokenize(&self, text: &str) -> Vec<(String, Position)> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut tokens = Vec::new();
        for (pos, caps) in self.regex.captures_iter(&normalized).enumerate() {
            let pos = pos as Position;
            if let Some(special) = caps.name("special") {
                tokens.push((special.as_str().to_string(), pos));
                continue;
            }
            let Some(word) = caps.name("word") else { continue };
            let word = word.as_str();
            if self.options.remove_stopwords && is_stopword(word) {
                continue;
            }
            let term = if self.options.stem { STEMMER.stem(word).into_owned() } else { word.to_string() };
            tokens.push((term, pos));
        }
        tokens
    }

    /// Normalised terms of a query string, in order.
    pub fn terms(&self, text: &str) -> Vec<String> {
        self.tokenize(text).into_iter().map(|(t, _)| t).collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self {
            options: TokenizerOptions::default(),
            regex: WORD_ONLY.clone(),
        }
    }
}

/// Reads one regex per line; blank lines and `//` comments are skipped.
pub fn load_patterns(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("//"))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_tokenizer_keeps_every_word() {
        let t = Tokenizer::default();
        let toks = t.tokenize("The cat sat.");
        assert_eq!(
            toks,
            vec![("the".to_string(), 0), ("cat".to_string(), 1), ("sat".to_string(), 2)]
        );
    }

    #[test]
    fn stemming_and_stopwords() {
        let t = Tokenizer::new(TokenizerOptions { stem: true, remove_stopwords: true, ..Default::default() }).unwrap();
        let toks = t.tokenize("Running, runner's run!");
        assert!(toks.iter().any(|(w, _)| w == "run"));
        let toks = t.tokenize("the runs");
        assert_eq!(toks, vec![("run".to_string(), 1)]);
    }
}
