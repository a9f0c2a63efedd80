use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ragpipe_chunk::HybridSplitter;
use ragpipe_core::config::{Config, Settings};
use ragpipe_core::loader::{clean_documents, load_documents};
use ragpipe_core::traits::Embedder;
use ragpipe_core::types::SearchMode;
use ragpipe_embed::get_default_embedder;
use ragpipe_rerank::HttpReranker;
use ragpipe_retrieval::{format_context, Retriever};
use ragpipe_vector::VectorIndex;

/// Exit code when the index has to be (re)built before querying.
const EXIT_REBUILD_REQUIRED: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "ragpipe")]
#[command(about = "Ingest Markdown into a vector index and query it with reranking")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load, chunk, embed and index a directory of Markdown files
    Ingest {
        /// Document directory (defaults to data.raw_dir)
        dir: Option<PathBuf>,
        /// Replace the active index instead of appending to it
        #[arg(long)]
        force: bool,
    },
    /// Retrieve and rerank chunks for a question
    Query {
        text: String,
        /// Plain nearest-neighbour candidates instead of MMR
        #[arg(long)]
        similarity: bool,
        /// Print the prompt context block instead of a result list
        #[arg(long)]
        context: bool,
    },
    /// Show the active build and its row count
    Status,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(err) = run(args).await {
        if let Some(e) = err.downcast_ref::<ragpipe_core::Error>() {
            if e.is_rebuild_required() {
                eprintln!("{e}");
                eprintln!("hint: run `ragpipe ingest --force` to build the index");
                process::exit(EXIT_REBUILD_REQUIRED);
            }
        }
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = Config::load()?.settings()?;
    match args.command {
        Command::Ingest { dir, force } => ingest(&settings, dir, force).await,
        Command::Query { text, similarity, context } => query(&settings, &text, similarity, context).await,
        Command::Status => status(&settings).await,
    }
}

async fn ingest(settings: &Settings, dir: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let dir = dir.unwrap_or_else(|| settings.raw_dir());
    let documents = load_documents(&dir).with_context(|| format!("loading documents from {}", dir.display()))?;
    let documents = clean_documents(documents);
    if documents.is_empty() {
        anyhow::bail!("no usable Markdown documents under {}", dir.display());
    }

    let chunks = HybridSplitter::from_settings(&settings.chunking)?.split(&documents);
    let index = VectorIndex::from_settings(settings, get_default_embedder(settings)?);
    let handle = index.build_index(&chunks, force).await?;

    println!(
        "Indexed {} chunks from {} documents into build {} ({} rows total)",
        chunks.len(),
        documents.len(),
        handle.build_id(),
        handle.count().await?
    );
    Ok(())
}

async fn query(settings: &Settings, text: &str, similarity: bool, context: bool) -> anyhow::Result<()> {
    let index = VectorIndex::from_settings(settings, get_default_embedder(settings)?);
    let handle = index.open_index().await?;
    let mut retriever = Retriever::new(handle, HttpReranker::new(&settings.rerank)?, &settings.retrieval)?;
    if similarity {
        retriever = retriever.with_mode(SearchMode::Similarity);
    }

    let results = retriever.retrieve(text).await?;
    if context {
        println!("{}", format_context(&results));
        return Ok(());
    }
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (rank, scored) in results.iter().enumerate() {
        let relevance = scored.relevance.map_or_else(|| "unscored".to_string(), |r| format!("{r:.3}"));
        println!("{}. [{}] {}", rank + 1, relevance, scored.chunk.source().unwrap_or("Unknown"));
        println!("   {}", preview(&scored.chunk.content, 160));
    }
    Ok(())
}

async fn status(settings: &Settings) -> anyhow::Result<()> {
    let embedder = get_default_embedder(settings)?;
    let embedder_id = embedder.embedder_id().to_string();
    let index = VectorIndex::from_settings(settings, embedder);
    let handle = index.open_index().await?;
    println!("root:       {}", index.root().display());
    println!("collection: {}", handle.collection());
    println!("build:      {}", handle.build_id());
    println!("rows:       {}", handle.count().await?);
    println!("embedder:   {embedder_id}");
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{cut}…")
}
