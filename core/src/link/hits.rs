use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use super::graph::load_titles;
use super::LinkGraph;
use crate::postings::{PostingsEntry, PostingsList};
use crate::storage::{file_name, DocumentTable};
use crate::Result;

pub const EPSILON: f64 = 0.001;
pub const MAX_ITERATIONS: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct HitsScores {
    pub hubs: HashMap<usize, f64>,
    pub authorities: HashMap<usize, f64>,
    pub iterations: usize,
    pub converged: bool,
}

impl HitsScores {
    pub fn top_hubs(&self, n: usize) -> Vec<(usize, f64)> {
        top(&self.hubs, n)
    }

    pub fn top_authorities(&self, n: usize) -> Vec<(usize, f64)> {
        top(&self.authorities, n)
    }
}

fn top(scores: &HashMap<usize, f64>, n: usize) -> Vec<(usize, f64)> {
    let mut sorted: Vec<(usize, f64)> = scores.iter().map(|(&k, &v)| (k, v)).collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    sorted.truncate(n);
    sorted
}

fn l2_normalize(values: &mut [f64]) {
    let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        values.iter_mut().for_each(|v| *v /= norm);
    }
}

/// Query-scoped hubs and authorities over a static link graph.
///
/// Documents are matched to graph nodes by file name: the document's name
/// without directories must equal the node's title.
pub struct HitsRanker {
    graph: LinkGraph,
    titles: HashMap<String, String>,
    node_of_title: HashMap<String, usize>,
}

impl HitsRanker {
    pub fn new(graph: LinkGraph, titles: HashMap<String, String>) -> Self {
        let node_of_title = titles
            .iter()
            .filter_map(|(label, title)| Some((title.clone(), graph.index_of(label)?)))
            .collect();
        Self { graph, titles, node_of_title }
    }

    pub fn load(links: &Path, titles: &Path) -> Result<Self> {
        Ok(Self::new(LinkGraph::load(links)?, load_titles(titles)?))
    }

    pub fn graph(&self) -> &LinkGraph {
        &self.graph
    }

    pub fn title(&self, node: usize) -> Option<&str> {
        self.titles.get(self.graph.label(node)).map(String::as_str)
    }

    pub fn node_of_title(&self, title: &str) -> Option<usize> {
        self.node_of_title.get(title).copied()
    }

    /// Root nodes plus every node they link to and every node linking to them.
    pub fn base_set(&self, root: &BTreeSet<usize>) -> BTreeSet<usize> {
        let mut base = root.clone();
        for &node in root {
            base.extend(self.graph.out_links(node));
            base.extend(self.graph.in_links(node));
        }
        base
    }

    /// Iterates HITS over the whole graph, updating only `nodes`. Every node
    /// starts at 1; each sweep adds the previous hub (authority) mass of all
    /// in- (out-) neighbours, then both vectors are L2-normalised. Scores are
    /// reported for `nodes` only.
    pub fn iterate(&self, nodes: &BTreeSet<usize>) -> HitsScores {
        let size = self.graph.len();
        let mut hub = vec![1.0; size];
        let mut auth = vec![1.0; size];
        let mut iterations = 0;
        let mut converged = nodes.is_empty();
        while !converged && iterations < MAX_ITERATIONS {
            iterations += 1;
            let mut next_hub = hub.clone();
            let mut next_auth = auth.clone();
            for &v in nodes {
                next_auth[v] += self.graph.in_links(v).iter().map(|&u| hub[u]).sum::<f64>();
                next_hub[v] += self.graph.out_links(v).iter().map(|&w| auth[w]).sum::<f64>();
            }
            l2_normalize(&mut next_hub);
            l2_normalize(&mut next_auth);

            let diff_hub: f64 = next_hub.iter().zip(&hub).map(|(a, b)| (a - b).abs()).sum();
            let diff_auth: f64 = next_auth.iter().zip(&auth).map(|(a, b)| (a - b).abs()).sum();
            converged = diff_hub < EPSILON && diff_auth < EPSILON;
            hub = next_hub;
            auth = next_auth;
        }
        if !converged {
            tracing::warn!(iterations, nodes = nodes.len(), "hits stopped before converging");
        }

        HitsScores {
            hubs: nodes.iter().map(|&n| (n, hub[n])).collect(),
            authorities: nodes.iter().map(|&n| (n, auth[n])).collect(),
            iterations,
            converged,
        }
    }

    /// Ranks the base set of `result` by hub + authority. Only nodes whose
    /// title names an indexed document appear in the answer.
    pub fn rank(&self, result: &PostingsList, docs: &DocumentTable) -> PostingsList {
        let root: BTreeSet<usize> = result
            .doc_ids()
            .filter_map(|id| docs.name(id))
            .filter_map(|name| self.node_of_title(file_name(name)))
            .collect();
        let base = self.base_set(&root);
        tracing::debug!(root = root.len(), base = base.len(), "hits base set");
        let scores = self.iterate(&base);

        let doc_of_name = docs.ids_by_file_name();
        let mut answer = PostingsList::new();
        for node in &base {
            let Some(doc_id) = self.title(*node).and_then(|t| doc_of_name.get(t)) else { continue };
            let score = scores.hubs.get(node).copied().unwrap_or(0.0)
                + scores.authorities.get(node).copied().unwrap_or(0.0);
            answer.push(PostingsEntry::scored(*doc_id, score));
        }
        answer.sort_by_score();
        answer
    }

    /// Runs HITS over the whole graph.
    pub fn rank_all(&self) -> HitsScores {
        let all: BTreeSet<usize> = (0..self.graph.len()).collect();
        self.iterate(&all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocId;

    fn ranker() -> HitsRanker {
        // 1 -> 2 -> 3 -> 4, and 5 -> 3
        let graph = LinkGraph::parse("1;2\n2;3\n3;4\n5;3\n".as_bytes(), Path::new("links.txt")).unwrap();
        let titles = (1..=5).map(|i| (i.to_string(), format!("Page{i}.f"))).collect();
        HitsRanker::new(graph, titles)
    }

    fn docs() -> DocumentTable {
        let mut docs = DocumentTable::default();
        for i in 1..=5u32 {
            docs.add(100 + i, format!("corpus/Page{i}.f"), 10);
        }
        docs
    }

    #[test]
    fn base_set_is_root_plus_direct_neighbours() {
        let r = ranker();
        let node3 = r.graph().index_of("3").unwrap();
        let base = r.base_set(&BTreeSet::from([node3]));
        let labels: BTreeSet<&str> = base.iter().map(|&n| r.graph().label(n)).collect();
        assert_eq!(labels, BTreeSet::from(["2", "3", "4", "5"]));
    }

    #[test]
    fn rank_maps_back_to_document_ids() {
        let r = ranker();
        let result = PostingsList::from_entries(vec![PostingsEntry::new(103, 0)]);
        let ranked = r.rank(&result, &docs());
        let ids: BTreeSet<DocId> = ranked.doc_ids().collect();
        assert_eq!(ids, BTreeSet::from([102, 103, 104, 105]));
        // page 3 is the only node with two in-links
        assert_eq!(ranked.entries()[0].doc_id, 103);
    }

    #[test]
    fn neighbours_outside_the_updated_set_still_count() {
        // x -> a, y -> b, z -> b; only a and b are updated
        let graph = LinkGraph::parse("x;a\ny;b\nz;b\n".as_bytes(), Path::new("links.txt")).unwrap();
        let r = HitsRanker::new(graph, HashMap::new());
        let a = r.graph().index_of("a").unwrap();
        let b = r.graph().index_of("b").unwrap();
        let scores = r.iterate(&BTreeSet::from([a, b]));
        assert_eq!(scores.authorities.len(), 2);
        assert!(scores.authorities[&b] > scores.authorities[&a]);
        assert!(scores.authorities[&a] > 0.0);
    }

    #[test]
    fn scores_are_unit_vectors() {
        let scores = ranker().rank_all();
        assert!(scores.converged);
        let norm: f64 = scores.authorities.values().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_documents_give_empty_ranking() {
        let r = ranker();
        let mut docs = DocumentTable::default();
        docs.add(0, "elsewhere/Other.f", 1);
        let result = PostingsList::from_entries(vec![PostingsEntry::new(0, 0)]);
        assert!(r.rank(&result, &docs).is_empty());
    }
}
