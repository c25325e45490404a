use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ir_core::config::{IndexConfig, IndexMode};
use ir_core::link::{self, HitsRanker, LinkGraph, MonteCarloParams, PageRankParams, WalkVariant};
use ir_core::persist::{load_document_table, load_meta, save_meta, save_pagerank, IndexPaths, MetaFile, META_VERSION};
use ir_core::search::{NormalizationType, Query, QueryType, RankingType, Searcher};
use ir_core::tokenizer::{load_patterns, Tokenizer, TokenizerOptions};
use ir_core::{create_index, open_index, DocId};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build persistent inverted indexes and link-analysis rankings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Method {
    Exact,
    EndPointRandom,
    EndPointCyclic,
    CompletePathCyclic,
    CompletePathRandom,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every file under the input directories
    Build {
        /// Input directories or files
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value = "single")]
        mode: IndexMode,
        /// Dictionary slots; defaults depend on the mode
        #[arg(long)]
        table_size: Option<u64>,
        /// Distinct terms per flushed segment (scalable mode)
        #[arg(long)]
        flush_threshold: Option<usize>,
        #[arg(long, default_value_t = false)]
        stem: bool,
        #[arg(long, default_value_t = false)]
        stopwords: bool,
        /// File with one special-token regex per line
        #[arg(long)]
        patterns: Option<PathBuf>,
    },
    /// Compute PageRank and store it next to the index
    Pagerank {
        #[arg(long)]
        links: PathBuf,
        #[arg(long)]
        titles: PathBuf,
        /// Index whose documents receive the values
        #[arg(long)]
        index: PathBuf,
        #[arg(long, value_enum, default_value = "exact")]
        method: Method,
        /// Number of Monte Carlo walks (default: twice the node count)
        #[arg(long)]
        walks: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        /// Print the highest ranked pages
        #[arg(long, default_value_t = 30)]
        top: usize,
    },
    /// Whole-graph hubs and authorities
    Hits {
        #[arg(long)]
        links: PathBuf,
        #[arg(long)]
        titles: PathBuf,
        #[arg(long, default_value_t = 30)]
        top: usize,
        /// Directory for hubs_top_N.txt and authorities_top_N.txt
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run one query against a built index
    Search {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "intersection")]
        query_type: QueryType,
        #[arg(long, default_value = "tfidf")]
        ranking: RankingType,
        #[arg(long, default_value = "number")]
        norm: NormalizationType,
        #[arg(long, default_value_t = 10)]
        k: usize,
        #[arg(long)]
        links: Option<PathBuf>,
        #[arg(long)]
        titles: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, mode, table_size, flush_threshold, stem, stopwords, patterns } => {
            let mut config = IndexConfig::for_mode(mode);
            if let Some(size) = table_size {
                config = config.with_table_size(size);
            }
            if let Some(threshold) = flush_threshold {
                config = config.with_flush_threshold(threshold);
            }
            let patterns = match patterns {
                Some(path) => load_patterns(&path).with_context(|| format!("reading {}", path.display()))?,
                None => Vec::new(),
            };
            let options = TokenizerOptions { stem, remove_stopwords: stopwords, patterns };
            build_index(&input, &output, config, options)
        }
        Commands::Pagerank { links, titles, index, method, walks, seed, top } => {
            pagerank(&links, &titles, &index, method, walks, seed, top)
        }
        Commands::Hits { links, titles, top, output } => hits(&links, &titles, top, output.as_deref()),
        Commands::Search { index, query, query_type, ranking, norm, k, links, titles } => {
            search(&index, &query, query_type, ranking, norm, k, links.zip(titles))
        }
    }
}

fn collect_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            tracing::warn!(path = %input.display(), "input not found, skipping");
        }
    }
    files
}

fn build_index(inputs: &[PathBuf], output: &Path, config: IndexConfig, options: TokenizerOptions) -> Result<()> {
    let start = std::time::Instant::now();
    let tokenizer = Tokenizer::new(options.clone())?;
    let mut index = create_index(output, config.clone())?;

    let mut next_doc_id: DocId = 0;
    for file in collect_files(inputs) {
        let bytes = match fs::read(&file) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "unreadable file, skipping");
                continue;
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        let tokens = tokenizer.tokenize(&text);
        let doc_id = next_doc_id;
        next_doc_id += 1;
        for (term, position) in &tokens {
            index.insert(term, doc_id, *position)?;
        }
        index.add_document(doc_id, &file.to_string_lossy(), tokens.len() as u32);
        if next_doc_id % 1000 == 0 {
            tracing::info!(docs = next_doc_id, "indexing");
        }
    }

    index.finalize()?;
    index.compute_norms()?;

    let meta = MetaFile {
        num_docs: next_doc_id,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        version: META_VERSION,
        mode: config.mode,
        table_size: config.table_size,
        flush_threshold: config.flush_threshold,
        tokenizer: options,
    };
    save_meta(&IndexPaths::new(output), &meta)?;
    tracing::info!(
        output = %output.display(),
        num_docs = next_doc_id,
        took_s = start.elapsed().as_secs_f64(),
        "index build complete"
    );
    Ok(())
}

fn pagerank(
    links: &Path,
    titles: &Path,
    index: &Path,
    method: Method,
    walks: Option<usize>,
    seed: Option<u64>,
    top: usize,
) -> Result<()> {
    let graph = LinkGraph::load(links).with_context(|| format!("reading {}", links.display()))?;
    let titles = link::load_titles(titles)?;

    let variant = match method {
        Method::Exact => None,
        Method::EndPointRandom => Some(WalkVariant::EndPointRandomStart),
        Method::EndPointCyclic => Some(WalkVariant::EndPointCyclicStart),
        Method::CompletePathCyclic => Some(WalkVariant::CompletePathCyclicStart),
        Method::CompletePathRandom => Some(WalkVariant::CompletePathRandomStart),
    };
    let values = match variant {
        None => {
            let result = link::power_iteration(&graph, &PageRankParams::default());
            tracing::info!(iterations = result.iterations, converged = result.converged, "power iteration done");
            result.values
        }
        Some(variant) => {
            let mut params = MonteCarloParams::new(variant);
            params.walks = walks;
            params.seed = seed;
            link::estimate(&graph, &params)
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (node, value) in link::top_n(&values, top) {
        let label = graph.label(node);
        let title = titles.get(label).map(String::as_str).unwrap_or(label);
        writeln!(out, "{title}: {value:.5}")?;
    }

    let paths = IndexPaths::new(index);
    let docs = load_document_table(&paths)?;
    if docs.is_empty() {
        bail!("no documents in {}; build the index first", index.display());
    }
    let scores = link::scores_by_document(&graph, &values, &titles, &docs);
    save_pagerank(&paths.pagerank(), &scores)?;
    tracing::info!(file = %paths.pagerank().display(), documents = scores.len(), "pagerank saved");
    Ok(())
}

fn hits(links: &Path, titles: &Path, top: usize, output: Option<&Path>) -> Result<()> {
    let ranker = HitsRanker::load(links, titles)?;
    let scores = ranker.rank_all();
    tracing::info!(iterations = scores.iterations, converged = scores.converged, "hits done");

    let lists = [("hubs", scores.top_hubs(top)), ("authorities", scores.top_authorities(top))];
    for (name, list) in &lists {
        let mut text = String::new();
        for (node, value) in list {
            text.push_str(&format!("{}: {value:.5}\n", ranker.graph().label(*node)));
        }
        match output {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                fs::write(dir.join(format!("{name}_top_{top}.txt")), text)?;
            }
            None => print!("# {name}\n{text}"),
        }
    }
    Ok(())
}

fn search(
    index_dir: &Path,
    text: &str,
    query_type: QueryType,
    ranking: RankingType,
    norm: NormalizationType,
    k: usize,
    link_files: Option<(PathBuf, PathBuf)>,
) -> Result<()> {
    let index = open_index(index_dir)?;
    let options = load_meta(&IndexPaths::new(index_dir))?.map(|m| m.tokenizer).unwrap_or_default();
    let tokenizer = Tokenizer::new(options)?;
    let hits = match link_files {
        Some((links, titles)) => Some(HitsRanker::load(&links, &titles)?),
        None => None,
    };

    let mut searcher = Searcher::new(index.as_ref());
    if let Some(hits) = &hits {
        searcher = searcher.with_hits(hits);
    }
    let query = Query::from_terms(tokenizer.terms(text));
    let Some(result) = searcher.search(&query, query_type, ranking, norm)? else {
        println!("no matching documents");
        return Ok(());
    };

    println!("{} matching documents", result.len());
    let docs = index.documents();
    for entry in result.iter().take(k) {
        let name = docs.name(entry.doc_id).unwrap_or("?");
        match query_type {
            QueryType::Ranked => println!("{:>8}  {:.5}  {name}", entry.doc_id, entry.score),
            _ => println!("{:>8}  {name}", entry.doc_id),
        }
    }
    Ok(())
}
