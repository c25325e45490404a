//! Link analysis over a static link graph: exact PageRank, Monte Carlo
//! estimates of it, and query-scoped HITS.

mod graph;
pub mod hits;
pub mod monte_carlo;
pub mod pagerank;

pub use graph::{load_titles, LinkGraph};
pub use hits::{HitsRanker, HitsScores};
pub use monte_carlo::{estimate, MonteCarloParams, WalkVariant};
pub use pagerank::{power_iteration, PageRankParams, PageRankResult};

use std::collections::HashMap;

use crate::storage::DocumentTable;
use crate::DocId;

/// The `n` highest values with their node indices, best first.
pub fn top_n(values: &[f64], n: usize) -> Vec<(usize, f64)> {
    let mut ranked: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

/// Maps per-node values onto document ids: node label → title through
/// `titles`, then title → document by file name. Nodes without a matching
/// document are dropped.
pub fn scores_by_document(
    graph: &LinkGraph,
    values: &[f64],
    titles: &HashMap<String, String>,
    docs: &DocumentTable,
) -> HashMap<DocId, f64> {
    let ids = docs.ids_by_file_name();
    let scores: HashMap<DocId, f64> = values
        .iter()
        .enumerate()
        .filter_map(|(node, &v)| {
            let title = titles.get(graph.label(node))?;
            Some((*ids.get(title.as_str())?, v))
        })
        .collect();
    tracing::info!(nodes = values.len(), matched = scores.len(), "mapped link scores to documents");
    scores
}
