use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use ir_core::config::IndexConfig;
use ir_core::persist::{save_meta, IndexPaths, MetaFile, META_VERSION};
use ir_core::tokenizer::Tokenizer;
use ir_core::{create_index, DocId};
use serde_json::Value;
use server::{build_app, AppConfig};
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

const DOCS: &[(&str, &str)] = &[
    ("corpus/a.txt", "Rust is great. rust systems programming."),
    ("corpus/b.txt", "Learning rust."),
    ("corpus/c.txt", "Go systems programming."),
];

fn build_tiny_index(dir: &Path) {
    let config = IndexConfig::single().with_table_size(101);
    let tokenizer = Tokenizer::default();
    let mut index = create_index(dir, config.clone()).unwrap();
    for (doc_id, (name, text)) in DOCS.iter().enumerate() {
        let tokens = tokenizer.tokenize(text);
        for (term, pos) in &tokens {
            index.insert(term, doc_id as DocId, *pos).unwrap();
        }
        index.add_document(doc_id as DocId, name, tokens.len() as u32);
    }
    index.finalize().unwrap();
    index.compute_norms().unwrap();

    let meta = MetaFile {
        num_docs: DOCS.len() as u32,
        created_at: "2024-01-01T00:00:00Z".into(),
        version: META_VERSION,
        mode: config.mode,
        table_size: config.table_size,
        flush_threshold: config.flush_threshold,
        tokenizer: Default::default(),
    };
    save_meta(&IndexPaths::new(dir), &meta).unwrap();
}

async fn call(app: Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn hit_paths(v: &Value) -> Vec<String> {
    v["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["path"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn ranked_search_orders_by_tfidf() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = build_app(AppConfig::new(dir.path())).unwrap();

    let (status, v) = call(app, "/search?q=rust&mode=ranked&ranking=tfidf&norm=number").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total_hits"], 2);
    // 1 of 2 tokens outweighs 2 of 6
    assert_eq!(hit_paths(&v), vec!["corpus/b.txt", "corpus/a.txt"]);
    assert_eq!(v["results"][0]["title"], "b.txt");
}

#[tokio::test]
async fn intersection_and_phrase_queries() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = build_app(AppConfig::new(dir.path())).unwrap();

    let (_, v) = call(app.clone(), "/search?q=systems%20programming&mode=intersection").await;
    assert_eq!(v["total_hits"], 2);

    let (_, v) = call(app.clone(), "/search?q=rust%20systems&mode=phrase").await;
    assert_eq!(hit_paths(&v), vec!["corpus/a.txt"]);

    let (status, v) = call(app, "/search?q=haskell&mode=intersection").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total_hits"], 0);
}

#[tokio::test]
async fn hits_without_graph_answers_empty() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = build_app(AppConfig::new(dir.path())).unwrap();

    let (status, v) = call(app, "/search?q=rust&ranking=hits").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total_hits"], 0);
}

#[tokio::test]
async fn hits_ranking_covers_the_base_set() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let links = dir.path().join("links.txt");
    let titles = dir.path().join("titles.txt");
    fs::write(&links, "0;1,\n2;0,\n").unwrap();
    fs::write(&titles, "0;a.txt\n1;b.txt\n2;c.txt\n").unwrap();
    let app = build_app(AppConfig::new(dir.path()).with_links(&links, &titles)).unwrap();

    // root set {a, b}; c links into it
    let (_, v) = call(app, "/search?q=rust&ranking=hits").await;
    assert_eq!(v["total_hits"], 3);
    assert!(hit_paths(&v).contains(&"corpus/c.txt".to_string()));
}

#[tokio::test]
async fn doc_endpoint_and_health() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = build_app(AppConfig::new(dir.path())).unwrap();

    let (status, v) = call(app.clone(), "/doc/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["path"], "corpus/b.txt");
    assert_eq!(v["length"], 2);
    assert!(v["euclidean_norm"].as_f64().unwrap() > 0.0);

    let (status, _) = call(app.clone(), "/doc/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
