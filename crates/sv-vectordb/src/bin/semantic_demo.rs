//! Ingest a handful of facts, then run one semantic query against them.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use sv_core::{EmbeddingProvider, HashingEmbedder, SemanticConfig};
use sv_vectordb::SemanticStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

const FACTS: &[&str] = &[
    "The Eiffel Tower in Paris was completed in 1889.",
    "Mount Everest is the highest mountain above sea level.",
    "Honey never spoils when it is stored in a sealed container.",
    "Octopuses have three hearts and blue blood.",
    "The Great Wall of China is visible across many provinces.",
    "Rust guarantees memory safety without a garbage collector.",
    "Water boils at 100 degrees Celsius at sea level.",
    "Bananas are botanically classified as berries.",
];

#[derive(Parser, Debug)]
#[command(name = "semantic-demo", about = "Semantic search over a few hard-coded facts")]
struct Args {
    /// JSON config file; defaults plus SEMVEC_* variables are used otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How many facts to return
    #[arg(short = 'k', long, default_value_t = 3)]
    top_k: usize,

    /// Text to search for
    #[arg(default_value = "Which mountain is the tallest?")]
    query: String,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_provider(config: &SemanticConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding.provider.as_str() {
        "hashing" => Ok(Arc::new(
            HashingEmbedder::new(config.embedding.dimension)?.with_model(config.embedding.model.clone()),
        )),
        other => bail!("embedding provider '{other}' is not available in this build"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => SemanticConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SemanticConfig::from_env()?,
    };
    init_tracing(&config.logging.level);

    let provider = build_provider(&config)?;
    let store = SemanticStore::from_config(&config, provider)?;

    let facts = FACTS.iter().enumerate().map(|(i, fact)| (format!("fact:{i}"), *fact));
    let ingested = store.ingest_batch(facts).await?;
    info!(ingested, total = store.len(), "Facts stored");

    let result = store.query(&args.query, args.top_k).await?;
    println!("query: {}", args.query);
    for hit in result {
        let text = store.get(&hit.id)?.content().unwrap_or_default().to_string();
        println!("{:<8} {:>8.4}  {}", hit.id, hit.distance, text);
    }
    Ok(())
}
