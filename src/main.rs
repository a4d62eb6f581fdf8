use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use greenlens::chunker;
use greenlens::config::Config;
use greenlens::embedder::Embedder;
use greenlens::embedder::ngram::NgramEmbedder;
use greenlens::embedder::remote::RemoteEmbedder;
use greenlens::feed::google_news::GoogleNewsFeed;
use greenlens::index::builder::IndexBuilder;
use greenlens::index::{IndexError, IndexStore};
use greenlens::llm::ollama::OllamaGenerator;
use greenlens::orchestrator::Pipeline;

#[derive(Parser)]
#[command(name = "greenlens", version, about)]
struct Cli {
    /// Path to the JSON config file.
    #[arg(long, default_value = "config.json")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the similarity index from the extracted report texts.
    Index,
    /// Run one greenwashing assessment.
    Ask {
        #[arg(long)]
        company: String,
        #[arg(long)]
        question: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    config.validate()?;

    match cli.command {
        Command::Index => build_index(&config),
        Command::Ask { company, question } => ask(&config, &company, &question),
    }
}

fn make_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    if config.model.endpoint.is_empty() {
        warn!("model.endpoint not configured, using offline hashed-ngram embedder");
        return Ok(Arc::new(NgramEmbedder::new(config.model.dimensions)));
    }
    let remote = RemoteEmbedder::new(
        &config.model.endpoint,
        &config.model.name,
        config.model.dimensions,
        Duration::from_secs(config.model.timeout_secs),
    )?;
    Ok(Arc::new(remote))
}

fn build_index(config: &Config) -> Result<()> {
    let data_dir = Path::new(&config.data_dir);
    anyhow::ensure!(
        data_dir.is_dir(),
        "data directory not found: {}",
        config.data_dir
    );

    let mut chunks = Vec::new();
    let mut documents = 0usize;
    let mut entries: Vec<_> = std::fs::read_dir(data_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("txt"))
        .collect();
    entries.sort();

    for path in entries {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let meta = chunker::derive_doc_meta(stem);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let before = chunks.len();
        chunks.extend(chunker::chunk_document(&meta, &text, &config.chunk));
        let produced = chunks.len() - before;

        if produced == 0 {
            warn!("{} yielded no chunks, skipping", path.display());
        } else {
            documents += 1;
            info!("{}: {produced} chunks", path.display());
        }
    }

    let embedder = make_embedder(config)?;
    let report = IndexBuilder::new(embedder.as_ref(), config.model.batch_size)
        .build(chunks, Path::new(&config.index_dir))?;

    info!(
        "Indexed {documents} documents: {} chunks embedded, {} skipped",
        report.embedded, report.skipped
    );
    Ok(())
}

fn ask(config: &Config, company: &str, question: &str) -> Result<()> {
    let index = match IndexStore::load(Path::new(&config.index_dir)) {
        Ok(store) => Some(Arc::new(store)),
        Err(IndexError::Missing { dir }) => {
            warn!("No index under {dir}; commitment extraction will be unavailable");
            None
        }
        Err(e) => return Err(e.into()),
    };

    let embedder = make_embedder(config)?;
    let generator = Arc::new(OllamaGenerator::new(
        &config.llm.base_url,
        &config.llm.model,
        Duration::from_secs(config.llm.timeout_secs),
    )?);
    let feed = Arc::new(GoogleNewsFeed::new(
        &config.feed.base_url,
        &config.feed.lang,
        &config.feed.region,
        &config.feed.edition,
        Duration::from_secs(config.feed.timeout_secs),
    )?);

    let pipeline = Pipeline::new(index, embedder, generator, feed, Arc::new(config.clone()))?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    let response = runtime.block_on(pipeline.run(company, question))?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
