use super::LinkGraph;

/// Probability that the surfer gets bored and jumps to a random page.
pub const BORED: f64 = 0.15;
pub const EPSILON: f64 = 0.0001;
pub const MAX_ITERATIONS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRankParams {
    pub bored: f64,
    pub epsilon: f64,
    pub max_iterations: usize,
}

impl Default for PageRankParams {
    fn default() -> Self {
        Self { bored: BORED, epsilon: EPSILON, max_iterations: MAX_ITERATIONS }
    }
}

#[derive(Debug, Clone)]
pub struct PageRankResult {
    /// One value per graph node, summing to 1.
    pub values: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Exact PageRank by power iteration.
///
/// Starts from all mass on node 0. Each round every node receives
/// `bored / N` plus `(1 - bored) / outDegree(u)` of each in-neighbour `u`'s
/// previous value. Mass held by nodes without out-links is dropped and
/// restored by the final L1 normalisation.
pub fn power_iteration(graph: &LinkGraph, params: &PageRankParams) -> PageRankResult {
    let n = graph.len();
    if n == 0 {
        return PageRankResult { values: Vec::new(), iterations: 0, converged: true };
    }

    let mut x = vec![0.0; n];
    x[0] = 1.0;
    let mut iterations = 0;
    let mut converged = false;
    while !converged && iterations < params.max_iterations {
        iterations += 1;
        let mut next = vec![params.bored / n as f64; n];
        for from in 0..n {
            let degree = graph.out_degree(from);
            if degree == 0 {
                continue;
            }
            let share = x[from] * (1.0 - params.bored) / degree as f64;
            for &to in graph.out_links(from) {
                next[to] += share;
            }
        }
        let diff: f64 = next.iter().zip(&x).map(|(a, b)| (a - b).abs()).sum();
        tracing::trace!(iterations, diff, "pagerank round");
        converged = diff < params.epsilon;
        x = next;
    }

    let sum: f64 = x.iter().sum();
    if sum > 0.0 {
        x.iter_mut().for_each(|v| *v /= sum);
    }
    if converged {
        tracing::info!(iterations, nodes = n, "pagerank converged");
    } else {
        tracing::warn!(iterations, nodes = n, "pagerank stopped before converging");
    }
    PageRankResult { values: x, iterations, converged }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn graph(text: &str) -> LinkGraph {
        LinkGraph::parse(text.as_bytes(), Path::new("links.txt")).unwrap()
    }

    #[test]
    fn mutual_pair_converges_to_half() {
        let result = power_iteration(&graph("0;1\n1;0\n"), &PageRankParams::default());
        assert!(result.converged);
        assert!((result.values[0] - 0.5).abs() < EPSILON);
        assert!((result.values[1] - 0.5).abs() < EPSILON);
    }

    #[test]
    fn values_sum_to_one_with_dangling_nodes() {
        let result = power_iteration(&graph("a;b,c\nb;c\n"), &PageRankParams::default());
        let sum: f64 = result.values.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        // c is linked from both others and links nowhere
        assert!(result.values[2] > result.values[1]);
        assert!(result.values[1] > result.values[0]);
    }

    #[test]
    fn iteration_cap_reports_not_converged() {
        let params = PageRankParams { max_iterations: 1, ..PageRankParams::default() };
        let result = power_iteration(&graph("0;1\n1;2\n2;0\n"), &params);
        assert_eq!(result.iterations, 1);
        assert!(!result.converged);
    }

    #[test]
    fn empty_graph_is_empty() {
        let result = power_iteration(&LinkGraph::new(), &PageRankParams::default());
        assert!(result.values.is_empty());
    }
}
