mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use ai_llm_service::error_handler::ProcessEnv;
use ai_llm_service::telemetry;
use anyhow::{Context, Result};
use api::AppState;
use clap::{Parser, Subcommand};
use colored::Colorize;
use contextor::{ConversationLoop, IndicatifProgress, RagChain};
use rag_store::{IngestOutcome, LlmEmbedder, RagStore, load_text_document};
use tokio::io::BufReader;
use tracing::{Level, info, warn};
use tracing_subscriber::{Layer, filter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

/// Targets rendered by the library telemetry layer.
const OWN_TARGETS: &[&str] = &["rag_chat", "api", "contextor", "rag_store", "ai_llm_service"];

#[derive(Parser)]
#[command(name = "rag-chat", version, about = "Chat with a document through a vector store")]
struct Cli {
    /// Text corpus to ingest (overrides DOCUMENT_PATH).
    #[arg(long, global = true)]
    document: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk and embed the document unless the collection already exists.
    Ingest,
    /// One question without history; prints the retrieved documents first.
    Ask { question: String },
    /// Interactive history-aware chat on stdin/stdout.
    Chat {
        /// Print each answer at once instead of token by token.
        #[arg(long)]
        no_stream: bool,
    },
    /// HTTP chat API.
    Serve {
        /// Bind address (overrides API_ADDRESS).
        #[arg(long)]
        addr: Option<String>,
    },
}

impl Command {
    /// Console commands keep our own logs quiet so they don't interleave with the chat.
    fn own_log_level(&self) -> Level {
        match self {
            Command::Ask { .. } | Command::Chat { .. } => Level::WARN,
            Command::Ingest | Command::Serve { .. } => Level::INFO,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; variables may come from the environment.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("failed to read .env");
        }
    }

    let cli = Cli::parse();
    init_tracing(cli.command.own_log_level())?;

    let mut cfg = AppConfig::from_env(&ProcessEnv).context("invalid configuration")?;
    if let Some(path) = cli.document {
        cfg.document_path = path;
    }

    let llm = Arc::new(
        LlmServiceProfiles::new(cfg.chat.clone(), cfg.embedding.clone(), Some(10))
            .context("failed to initialise LLM service")?,
    );
    let embedder = Arc::new(LlmEmbedder::new(llm.clone(), cfg.rag.embedding_dim));
    let store = RagStore::qdrant(&cfg.rag, embedder).context("failed to connect to the vector store")?;
    info!(
        chat = %cfg.chat.model,
        embedding = %cfg.embedding.model,
        collection = %cfg.rag.collection,
        "services configured"
    );

    ingest(&store, &cfg.document_path).await?;
    if let Command::Ingest = cli.command {
        return Ok(());
    }

    let chain = RagChain::new(llm.clone(), store, cfg.contextor);
    match cli.command {
        Command::Ingest => {}
        Command::Ask { question } => ask(&chain, &question).await?,
        Command::Chat { no_stream } => {
            ConversationLoop::new(chain)
                .streaming(!no_stream)
                .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await
                .context("chat session failed")?;
        }
        Command::Serve { addr } => {
            let addr = addr.unwrap_or(cfg.api_address);
            let state = AppState::new(chain, cfg.chat_mode).with_llm(llm);
            api::start(&addr, state).await?;
        }
    }
    Ok(())
}

fn init_tracing(own_level: Level) -> Result<()> {
    let filter = telemetry::env_filter_with_level("warn", OWN_TARGETS, own_level);
    // Our crates go through the telemetry layer, everything else through a plain fmt layer.
    let third_party = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(filter::filter_fn(|meta| {
            !OWN_TARGETS.iter().any(|t| meta.target().starts_with(t))
        }));

    tracing_subscriber::registry()
        .with(filter)
        .with(telemetry::layer_for(OWN_TARGETS))
        .with(third_party)
        .try_init()
        .context("failed to install tracing subscriber")
}

/// Builds the collection on first run and completes a partially written one;
/// a complete collection is only reported.
async fn ingest(store: &RagStore, path: &Path) -> Result<()> {
    let doc = match load_text_document(path) {
        Ok(doc) => doc,
        Err(e) if store.index().collection_exists().await? => {
            warn!(error = %e, path = %path.display(), "document unreadable, keeping the existing collection");
            let existing = store.index().count().await?;
            println!(
                "{} collection '{}' holds {existing} vectors",
                "✓".green(),
                store.index().collection()
            );
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };

    match store.ingest_document(&doc).await? {
        IngestOutcome::Ingested { records } => {
            println!("{} ingested {records} chunks from {}", "✓".green(), path.display());
        }
        IngestOutcome::Skipped { existing } => {
            println!(
                "{} collection '{}' already holds {existing} vectors, skipping ingestion",
                "✓".green(),
                store.index().collection()
            );
        }
    }
    Ok(())
}

async fn ask(chain: &RagChain, question: &str) -> Result<()> {
    let qa = chain
        .ask_once_with_progress(question, &IndicatifProgress::spinner())
        .await?;

    println!("\n{}", "--- Relevant Documents ---".bold());
    for (i, chunk) in qa.context.iter().enumerate() {
        println!("{} {}:\n{}\n", "Document".cyan(), i + 1, chunk.text);
        if let Some(source) = &chunk.source {
            println!("Source: {source}\n");
        }
    }
    println!("{}", "--- Generated Response ---".bold());
    println!("{}", qa.answer);
    Ok(())
}
