use anyhow::{Context, Result};
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use ir_core::link::HitsRanker;
use ir_core::persist::{load_meta, IndexPaths};
use ir_core::search::{self, NormalizationType, QueryType, RankingType, Searcher};
use ir_core::storage::file_name;
use ir_core::tokenizer::Tokenizer;
use ir_core::{open_index, DocId, Index};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_mode")]
    pub mode: QueryType,
    #[serde(default)]
    pub ranking: RankingType,
    #[serde(default)]
    pub norm: NormalizationType,
}
fn default_k() -> usize { 10 }
fn default_mode() -> QueryType { QueryType::Ranked }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub title: String,
    pub path: String,
}

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<dyn Index>,
    pub hits: Option<Arc<HitsRanker>>,
    pub tokenizer: Arc<Tokenizer>,
}

pub struct AppConfig {
    pub index_dir: PathBuf,
    /// Link graph and titles file; enables HITS ranking.
    pub link_files: Option<(PathBuf, PathBuf)>,
}

impl AppConfig {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self { index_dir: index_dir.into(), link_files: None }
    }

    pub fn with_links(mut self, links: impl Into<PathBuf>, titles: impl Into<PathBuf>) -> Self {
        self.link_files = Some((links.into(), titles.into()));
        self
    }
}

pub fn build_app(config: AppConfig) -> Result<Router> {
    let root = config.index_dir;
    let index = open_index(&root).with_context(|| format!("opening index in {}", root.display()))?;
    let options = load_meta(&IndexPaths::new(&root))?.map(|m| m.tokenizer).unwrap_or_default();
    let hits = match config.link_files {
        Some((links, titles)) => {
            let ranker = HitsRanker::load(&links, &titles)
                .with_context(|| format!("loading link graph {}", links.display()))?;
            tracing::info!(nodes = ranker.graph().len(), "hits ranking enabled");
            Some(Arc::new(ranker))
        }
        None => None,
    };
    let app_state = AppState {
        index: Arc::from(index),
        hits,
        tokenizer: Arc::new(Tokenizer::new(options)?),
    };
    tracing::info!(docs = app_state.index.num_docs(), "index loaded");

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let query = search::Query::from_terms(state.tokenizer.terms(&params.q));

    let mut searcher = Searcher::new(state.index.as_ref());
    if let Some(hits) = &state.hits {
        searcher = searcher.with_hits(hits);
    }
    let result = match searcher.search(&query, params.mode, params.ranking, params.norm) {
        Ok(result) => result.unwrap_or_default(),
        Err(e) => {
            tracing::error!(error = %e, q = %params.q, "query failed");
            Default::default()
        }
    };

    let docs = state.index.documents();
    let k = params.k.clamp(1, 100);
    let results = result
        .iter()
        .take(k)
        .map(|e| {
            let path = docs.name(e.doc_id).unwrap_or_default().to_string();
            SearchHit { doc_id: e.doc_id, score: e.score, title: file_name(&path).to_string(), path }
        })
        .collect();

    Json(SearchResponse {
        query: params.q,
        took_s: start.elapsed().as_secs_f64(),
        total_hits: result.len(),
        results,
    })
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<DocId>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let docs = state.index.documents();
    let Some(doc) = docs.get(doc_id) else {
        return Err((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" }))));
    };
    Ok(Json(serde_json::json!({
        "doc_id": doc_id,
        "path": doc.name,
        "title": file_name(&doc.name),
        "length": doc.length,
        "euclidean_norm": docs.norm(doc_id),
        "pagerank": docs.pagerank(doc_id),
    })))
}
