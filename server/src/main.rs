use anyhow::Result;
use clap::Parser;
use server::{build_app, AppConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(about = "HTTP search over a built index")]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: PathBuf,
    /// Link graph (`from;to,to,...` lines); falls back to LINKS_FILE
    #[arg(long)]
    links: Option<PathBuf>,
    /// `label;title` lines for the link graph; falls back to TITLES_FILE
    #[arg(long)]
    titles: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).map(PathBuf::from)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = AppConfig::new(&args.index);
    let links = args.links.or_else(|| env_path("LINKS_FILE"));
    let titles = args.titles.or_else(|| env_path("TITLES_FILE"));
    match (links, titles) {
        (Some(links), Some(titles)) => config = config.with_links(links, titles),
        (None, None) => {}
        _ => tracing::warn!("both a links and a titles file are needed for hits ranking; ignoring"),
    }
    let app = build_app(config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, index = %args.index.display(), "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
