use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::{IndexError, Result};

/// Directed link graph read from `nodeID;target1,target2,...` lines.
///
/// Node labels are interned into dense indices in order of first
/// appearance, whether as a source or as a target. Duplicate edges count
/// once.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    labels: Vec<String>,
    index_of: HashMap<String, usize>,
    out_links: Vec<Vec<usize>>,
    in_links: Vec<Vec<usize>>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Self::parse(reader, path)
    }

    /// Parses link lines; `source` only labels format errors.
    pub fn parse<R: BufRead>(reader: R, source: &Path) -> Result<Self> {
        let mut graph = Self::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (from, targets) = line
                .split_once(';')
                .ok_or_else(|| IndexError::format(source, n + 1, "expected nodeID;targets"))?;
            let from = graph.node(from.trim());
            for target in targets.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                let to = graph.node(target);
                graph.add_edge(from, to);
            }
        }
        tracing::info!(nodes = graph.len(), edges = graph.num_edges(), "link graph loaded");
        Ok(graph)
    }

    /// Dense index of `label`, interning it when unseen.
    pub fn node(&mut self, label: &str) -> usize {
        if let Some(&i) = self.index_of.get(label) {
            return i;
        }
        let i = self.labels.len();
        self.labels.push(label.to_string());
        self.index_of.insert(label.to_string(), i);
        self.out_links.push(Vec::new());
        self.in_links.push(Vec::new());
        i
    }

    pub fn add_edge(&mut self, from: usize, to: usize) {
        if self.out_links[from].contains(&to) {
            return;
        }
        self.out_links[from].push(to);
        self.in_links[to].push(from);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_edges(&self) -> usize {
        self.out_links.iter().map(Vec::len).sum()
    }

    pub fn label(&self, node: usize) -> &str {
        &self.labels[node]
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index_of.get(label).copied()
    }

    pub fn out_links(&self, node: usize) -> &[usize] {
        &self.out_links[node]
    }

    pub fn in_links(&self, node: usize) -> &[usize] {
        &self.in_links[node]
    }

    pub fn out_degree(&self, node: usize) -> usize {
        self.out_links[node].len()
    }
}

/// Reads `nodeID;title` lines into a node label → title map.
pub fn load_titles(path: &Path) -> Result<HashMap<String, String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut titles = HashMap::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (id, title) = line
            .split_once(';')
            .ok_or_else(|| IndexError::format(path, n + 1, "expected nodeID;title"))?;
        titles.insert(id.trim().to_string(), title.trim().to_string());
    }
    Ok(titles)
}
