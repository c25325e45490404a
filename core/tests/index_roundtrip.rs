use std::collections::{BTreeMap, HashMap};

use ir_core::config::IndexConfig;
use ir_core::persist::{save_meta, save_pagerank, IndexPaths, MetaFile, META_VERSION};
use ir_core::search::{NormalizationType, Query, QueryType, RankingType, Searcher};
use ir_core::storage::segment::{merge_segments, write_segment, SegmentReader};
use ir_core::storage::MemoryIndex;
use ir_core::tokenizer::{Tokenizer, TokenizerOptions};
use ir_core::{create_index, open_index, DocId, Index, Position, PostingsList};
use proptest::prelude::*;
use tempfile::tempdir;

const CORPUS: &[&str] = &[
    "the quick brown fox jumps over the lazy dog",
    "a quick brown dog outpaces a quick red fox",
    "lazy afternoons and lazy dogs",
    "the fox and the hound",
    "brown bread with brown butter",
];

fn feed(index: &mut dyn Index, docs: &[&str]) {
    for (doc_id, text) in docs.iter().enumerate() {
        let words: Vec<&str> = text.split_whitespace().collect();
        for (pos, w) in words.iter().enumerate() {
            index.insert(w, doc_id as DocId, pos as Position).unwrap();
        }
        index.add_document(doc_id as DocId, &format!("corpus/doc{doc_id}.txt"), words.len() as u32);
    }
}

fn write_meta(root: &std::path::Path, config: &IndexConfig, num_docs: u32) {
    let meta = MetaFile {
        num_docs,
        created_at: "2024-01-01T00:00:00Z".into(),
        version: META_VERSION,
        mode: config.mode,
        table_size: config.table_size,
        flush_threshold: config.flush_threshold,
        tokenizer: Default::default(),
    };
    save_meta(&IndexPaths::new(root), &meta).unwrap();
}

fn reference() -> MemoryIndex {
    let mut memory = MemoryIndex::new();
    feed(&mut memory, CORPUS);
    memory
}

fn assert_same_postings(built: &dyn Index, memory: &MemoryIndex) {
    for (term, list) in memory.terms() {
        let stored = built.get_postings(term).unwrap().unwrap_or_else(|| panic!("{term} missing"));
        assert_eq!(stored.entries(), list.entries(), "postings of {term}");
    }
    assert!(built.get_postings("unicorn").unwrap().is_none());
}

fn build_and_reload(config: IndexConfig) {
    let dir = tempdir().unwrap();
    {
        let mut index = create_index(dir.path(), config.clone()).unwrap();
        feed(index.as_mut(), CORPUS);
        index.finalize().unwrap();
        index.compute_norms().unwrap();
        write_meta(dir.path(), &config, CORPUS.len() as u32);
    }
    let reopened = open_index(dir.path()).unwrap();
    assert_eq!(reopened.num_docs(), CORPUS.len());
    assert_eq!(reopened.documents().length(1), Some(9));
    assert_same_postings(reopened.as_ref(), &reference());

    let mut memory = reference();
    memory.compute_norms().unwrap();
    for (doc_id, norm) in memory.documents().norms() {
        let stored = reopened.documents().norm(*doc_id).unwrap();
        assert!((stored - norm).abs() < 1e-9, "norm of {doc_id}");
    }
}

#[test]
fn single_segment_round_trip() {
    build_and_reload(IndexConfig::single().with_table_size(1009));
}

#[test]
fn scalable_round_trip_with_many_flushes() {
    build_and_reload(IndexConfig::scalable().with_table_size(1009).with_flush_threshold(3));
}

fn separator_terms_survive(config: IndexConfig) {
    let dir = tempdir().unwrap();
    let tokenizer = Tokenizer::new(TokenizerOptions { patterns: vec![r"\w+\*\w+".into()], ..Default::default() }).unwrap();
    let mut index = create_index(dir.path(), config.clone()).unwrap();
    for (doc_id, text) in ["see a*b and c", "c and a*b again", "x*y a*b"].iter().enumerate() {
        let tokens = tokenizer.tokenize(text);
        for (term, pos) in &tokens {
            index.insert(term, doc_id as DocId, *pos).unwrap();
        }
        index.add_document(doc_id as DocId, &format!("doc{doc_id}"), tokens.len() as u32);
    }
    index.finalize().unwrap();
    index.compute_norms().unwrap();
    write_meta(dir.path(), &config, 3);
    drop(index);

    let reopened = open_index(dir.path()).unwrap();
    let ab = reopened.get_postings("a*b").unwrap().expect("a*b is indexed");
    assert_eq!(ab.to_string(), "0:1-1:2-2:1");
    assert_eq!(reopened.get_postings("x*y").unwrap().unwrap().to_string(), "2:0");
    assert_eq!(reopened.get_postings("c").unwrap().unwrap().to_string(), "0:3-1:0");
}

#[test]
fn separator_in_term_single_segment() {
    separator_terms_survive(IndexConfig::single().with_table_size(7));
}

#[test]
fn separator_in_term_scalable() {
    separator_terms_survive(IndexConfig::scalable().with_table_size(31).with_flush_threshold(2));
}

#[test]
fn rebuild_forgets_previous_pageranks() {
    let dir = tempdir().unwrap();
    let config = IndexConfig::single().with_table_size(1009);
    {
        let mut index = create_index(dir.path(), config.clone()).unwrap();
        feed(index.as_mut(), CORPUS);
        index.finalize().unwrap();
    }
    let paths = IndexPaths::new(dir.path());
    save_pagerank(&paths.pagerank(), &HashMap::from([(0, 0.7), (1, 0.3)])).unwrap();

    let mut index = create_index(dir.path(), config.clone()).unwrap();
    feed(index.as_mut(), &CORPUS[..2]);
    index.finalize().unwrap();
    write_meta(dir.path(), &config, 2);
    drop(index);

    let reopened = open_index(dir.path()).unwrap();
    assert_eq!(reopened.num_docs(), 2);
    assert_eq!(reopened.documents().pagerank(0), 0.0);
}

#[test]
fn missing_index_opens_empty() {
    let dir = tempdir().unwrap();
    let index = open_index(dir.path()).unwrap();
    assert_eq!(index.num_docs(), 0);
    assert!(index.get_postings("fox").unwrap().is_none());
}

#[test]
fn queries_agree_across_index_kinds() {
    let dir = tempdir().unwrap();
    let config = IndexConfig::scalable().with_table_size(1009).with_flush_threshold(4);
    let mut scalable = create_index(dir.path(), config).unwrap();
    feed(scalable.as_mut(), CORPUS);
    scalable.finalize().unwrap();
    scalable.compute_norms().unwrap();

    let mut memory = reference();
    memory.compute_norms().unwrap();

    for (text, qt) in [
        ("quick brown", QueryType::Intersection),
        ("quick brown", QueryType::Phrase),
        ("lazy fox", QueryType::Ranked),
    ] {
        let query = Query::parse(text);
        let a = Searcher::new(scalable.as_ref())
            .search(&query, qt, RankingType::TfIdf, NormalizationType::Euclidean)
            .unwrap();
        let b = Searcher::new(&memory)
            .search(&query, qt, RankingType::TfIdf, NormalizationType::Euclidean)
            .unwrap();
        let ids = |l: Option<PostingsList>| l.map(|l| l.doc_ids().collect::<Vec<_>>());
        assert_eq!(ids(a), ids(b), "{text} as {qt}");
    }
}

fn batch_strategy() -> impl Strategy<Value = Vec<BTreeMap<String, Vec<Position>>>> {
    prop::collection::vec(
        prop::collection::btree_map("[a-e]{1,2}", prop::collection::vec(0u32..20, 1..4), 1..6),
        1..5,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Merging per-batch segments one at a time gives the same postings as
    /// building everything in memory.
    #[test]
    fn pairwise_merges_match_single_pass(batches in batch_strategy()) {
        let dir = tempdir().unwrap();
        let mut memory = MemoryIndex::new();
        let mut accumulator: Option<std::path::PathBuf> = None;
        for (doc, batch) in batches.iter().enumerate() {
            let mut segment: BTreeMap<String, PostingsList> = BTreeMap::new();
            for (term, positions) in batch {
                for &p in positions {
                    memory.insert(term, doc as DocId, p).unwrap();
                    segment.entry(term.clone()).or_default().add_occurrence(doc as DocId, p);
                }
            }
            let path = dir.path().join(format!("s{doc}"));
            write_segment(&path, &segment).unwrap();
            accumulator = Some(match accumulator {
                None => path,
                Some(older) => {
                    let out = dir.path().join(format!("m{doc}"));
                    merge_segments(&older, &path, &out).unwrap();
                    out
                }
            });
        }

        let merged = accumulator.unwrap();
        let mut seen = 0;
        let mut last_term: Option<String> = None;
        for record in SegmentReader::open(&merged).unwrap() {
            let record = record.unwrap();
            let (term, _) = record.split().unwrap();
            prop_assert!(last_term.as_deref() < Some(term), "terms out of order");
            last_term = Some(term.to_string());
            let expected = memory.get_postings(term).unwrap().unwrap();
            let postings = record.postings().unwrap();
            prop_assert_eq!(postings.entries(), expected.entries());
            seen += 1;
        }
        prop_assert_eq!(seen, memory.num_terms());
    }
}
