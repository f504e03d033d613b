use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use regrag::config::Config;
use regrag::corpus::{Corpus, CorpusLoader};
use regrag::embedder::{self, Embedder};
use regrag::generation::{Generator, OpenAiGenerator};
use regrag::mcp::{McpContext, McpServer};
use regrag::orchestrator::{Orchestrator, QueryRequest};
use regrag::store::persist;
use regrag::watcher::CorpusWatcher;

#[derive(Parser)]
#[command(name = "regrag", version, about = "Question answering over regulatory documents")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, default_value = "config.json")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the corpus and serve MCP over stdio
    Serve,
    /// Answer one query and print the JSON response
    Ask {
        query: String,
        /// Restrict the answer to this document id
        #[arg(long)]
        document: Option<String>,
    },
    /// Embed every chunk and write the vector index to index_dir
    BuildIndex,
    /// List the section ids extracted from a document
    Sections { document: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP transport
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;
    let config = Arc::new(config);

    let embedder = load_embedder(&config).await?;
    let loader = CorpusLoader::new(config.clone(), embedder.clone());

    match cli.command {
        Command::Serve => serve(config, loader, embedder).await,
        Command::Ask { query, document } => {
            let (orchestrator, _) = start(&config, &loader, embedder).await?;
            let mut request = QueryRequest::new(query);
            request.selected_document_id = document;
            let response = orchestrator.answer(&request).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::BuildIndex => build_index(&config, loader).await,
        Command::Sections { document } => {
            let (snapshot, _) = tokio::task::spawn_blocking(move || loader.load())
                .await
                .context("corpus load task failed")?;
            if snapshot.document(&document).is_none() {
                bail!("document not found: {document}");
            }
            for id in snapshot.sections.section_ids(&document) {
                println!("{id}");
            }
            Ok(())
        }
    }
}

/// The model load may download files with a blocking client.
async fn load_embedder(config: &Arc<Config>) -> Result<Option<Arc<dyn Embedder>>> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || embedder::from_config(&config.embedder))
        .await
        .context("embedder init task failed")
}

async fn start(
    config: &Config,
    loader: &CorpusLoader,
    embedder: Option<Arc<dyn Embedder>>,
) -> Result<(Arc<Orchestrator>, Arc<Corpus>)> {
    let corpus = Arc::new(Corpus::default());
    loader
        .reload_into(&corpus)
        .await
        .context("initial corpus load failed")?;

    let generator = OpenAiGenerator::from_config(config).map(|g| Arc::new(g) as Arc<dyn Generator>);
    if generator.is_none() {
        info!("No generator configured, answers will be retrieval-only");
    }

    let orchestrator = Arc::new(Orchestrator::new(corpus.clone(), config, embedder, generator));
    Ok((orchestrator, corpus))
}

async fn serve(
    config: Arc<Config>,
    loader: CorpusLoader,
    embedder: Option<Arc<dyn Embedder>>,
) -> Result<()> {
    info!("Starting regrag MCP server...");
    let (orchestrator, corpus) = start(&config, &loader, embedder).await?;

    let _watcher = if config.watch {
        match CorpusWatcher::start(loader.clone(), corpus.clone()) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!("Corpus watching disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    let server = McpServer::new(McpContext {
        corpus,
        loader,
        orchestrator,
    });
    server.start().await
}

async fn build_index(config: &Config, loader: CorpusLoader) -> Result<()> {
    if loader.embedder().is_none() {
        bail!("no embedder available; set embedder.kind to onnx or hashing");
    }

    let (snapshot, report) = tokio::task::spawn_blocking(move || loader.load())
        .await
        .context("index build task failed")?;
    if !snapshot.has_vector_index() {
        bail!("corpus produced no indexable chunks");
    }

    let index_dir = config.index_dir();
    persist::save(&snapshot.chunks, &index_dir)
        .with_context(|| format!("failed to write index to {}", index_dir.display()))?;
    info!(
        "Wrote {} chunks ({:?}) to {}",
        report.chunks,
        report.index,
        index_dir.display()
    );
    Ok(())
}
