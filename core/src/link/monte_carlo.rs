//! Monte Carlo estimators of PageRank.
//!
//! A walk continues to a uniformly chosen out-neighbour with probability
//! `continue_prob` and otherwise stops; a node without out-links sends the
//! walk to a uniformly random node. Variants differ in where walks start
//! and in which visits are credited.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::str::FromStr;

use super::LinkGraph;
use crate::IndexError;

pub const CONTINUE_PROB: f64 = 0.85;
pub const SWEEPS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkVariant {
    /// Random start, credit the node where the walk stops.
    EndPointRandomStart,
    /// Every node starts walks in turn, credit the end point.
    EndPointCyclicStart,
    /// Every node starts walks in turn, credit every visited node.
    CompletePathCyclicStart,
    /// Random start, credit every visited node.
    CompletePathRandomStart,
}

impl WalkVariant {
    fn cyclic(self) -> bool {
        matches!(self, WalkVariant::EndPointCyclicStart | WalkVariant::CompletePathCyclicStart)
    }

    fn complete_path(self) -> bool {
        matches!(self, WalkVariant::CompletePathCyclicStart | WalkVariant::CompletePathRandomStart)
    }
}

impl FromStr for WalkVariant {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "end-point-random" | "1" => Ok(WalkVariant::EndPointRandomStart),
            "end-point-cyclic" | "2" => Ok(WalkVariant::EndPointCyclicStart),
            "complete-path-cyclic" | "4" => Ok(WalkVariant::CompletePathCyclicStart),
            "complete-path-random" | "5" => Ok(WalkVariant::CompletePathRandomStart),
            other => Err(IndexError::UnknownOption { kind: "walk variant", value: other.to_string() }),
        }
    }
}

impl fmt::Display for WalkVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WalkVariant::EndPointRandomStart => "end-point-random",
            WalkVariant::EndPointCyclicStart => "end-point-cyclic",
            WalkVariant::CompletePathCyclicStart => "complete-path-cyclic",
            WalkVariant::CompletePathRandomStart => "complete-path-random",
        })
    }
}

#[derive(Debug, Clone)]
pub struct MonteCarloParams {
    pub variant: WalkVariant,
    /// Total walks; defaults to twice the node count.
    pub walks: Option<usize>,
    pub continue_prob: f64,
    /// Passes over all nodes for the cyclic-start variants.
    pub sweeps: usize,
    pub seed: Option<u64>,
}

impl MonteCarloParams {
    pub fn new(variant: WalkVariant) -> Self {
        Self { variant, walks: None, continue_prob: CONTINUE_PROB, sweeps: SWEEPS, seed: None }
    }

    pub fn with_walks(mut self, walks: usize) -> Self {
        self.walks = Some(walks);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

struct Walker<'g> {
    graph: &'g LinkGraph,
    rng: StdRng,
    continue_prob: f64,
}

impl Walker<'_> {
    fn random_node(&mut self) -> usize {
        self.rng.random_range(0..self.graph.len())
    }

    fn step(&mut self, node: usize) -> usize {
        let links = self.graph.out_links(node);
        if links.is_empty() {
            self.random_node()
        } else {
            links[self.rng.random_range(0..links.len())]
        }
    }

    /// Runs one walk from `start`, crediting `counts` per `complete_path`.
    fn walk(&mut self, start: usize, complete_path: bool, counts: &mut [f64]) {
        let mut node = start;
        if complete_path {
            counts[node] += 1.0;
        }
        while self.rng.random::<f64>() < self.continue_prob {
            node = self.step(node);
            if complete_path {
                counts[node] += 1.0;
            }
        }
        if !complete_path {
            counts[node] += 1.0;
        }
    }
}

/// Estimates a PageRank vector; the result sums to 1.
pub fn estimate(graph: &LinkGraph, params: &MonteCarloParams) -> Vec<f64> {
    let n = graph.len();
    if n == 0 {
        return Vec::new();
    }
    let rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut walker = Walker { graph, rng, continue_prob: params.continue_prob };
    let mut counts = vec![0.0; n];
    let walks = params.walks.unwrap_or(2 * n);
    let complete_path = params.variant.complete_path();

    if params.variant.cyclic() {
        let sweeps = params.sweeps.max(1);
        let per_node = (walks / (sweeps * n)).max(1);
        for _ in 0..sweeps {
            for start in 0..n {
                for _ in 0..per_node {
                    walker.walk(start, complete_path, &mut counts);
                }
            }
        }
    } else {
        for _ in 0..walks {
            let start = walker.random_node();
            walker.walk(start, complete_path, &mut counts);
        }
    }

    let total: f64 = counts.iter().sum();
    if total > 0.0 {
        counts.iter_mut().for_each(|c| *c /= total);
    }
    tracing::info!(variant = %params.variant, walks, nodes = n, "monte carlo pagerank done");
    counts
}
