// Knowledge-base ingestion.
//
// Reads .txt/.md files from a docs directory, chunks them, embeds the
// chunks, and upserts them into the vector index. Offline batch path;
// never runs inside a request.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use openai_client::OpenAIClient;
use triage_core::kernel::retrieval::{chunk_text, KnowledgeDocument, KnowledgeRetriever};
use triage_core::kernel::PgVectorRetriever;
use triage_core::Config;

#[derive(Parser, Debug)]
#[command(name = "ingest_docs", about = "Ingest documentation into the knowledge base")]
struct Args {
    /// Directory of .txt/.md files (defaults to DOCS_DIR)
    #[arg(long)]
    docs_dir: Option<PathBuf>,

    /// Maximum characters per chunk
    #[arg(long, default_value_t = 1500)]
    chunk_chars: usize,

    /// Documents embedded per API call
    #[arg(long, default_value_t = 32)]
    batch_size: usize,
}

fn load_documents(dir: &PathBuf, chunk_chars: usize) -> Result<Vec<KnowledgeDocument>> {
    let mut documents = Vec::new();

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read docs directory {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_doc = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("txt") | Some("md")
        );
        if !is_doc {
            continue;
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let chunks = chunk_text(&content, chunk_chars);
        tracing::info!(file = %name, chunks = chunks.len(), "loaded document");

        for (idx, chunk) in chunks.into_iter().enumerate() {
            documents.push(KnowledgeDocument {
                id: format!("{}#{}", name, idx),
                source_name: name.clone(),
                text: chunk,
            });
        }
    }

    Ok(documents)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let docs_dir = args
        .docs_dir
        .unwrap_or_else(|| PathBuf::from(&config.docs_dir));

    let documents = load_documents(&docs_dir, args.chunk_chars)?;
    if documents.is_empty() {
        tracing::warn!(dir = %docs_dir.display(), "no documents found, nothing to ingest");
        return Ok(());
    }
    tracing::info!(count = documents.len(), "chunks ready for indexing");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    PgVectorRetriever::ensure_schema(&pool)
        .await
        .context("Failed to create knowledge-base schema")?;

    let openai = Arc::new(OpenAIClient::new(config.openai_api_key.clone()));
    let retriever = PgVectorRetriever::new(pool, openai, config.embedding_model.clone());

    let mut total = 0;
    for batch in documents.chunks(args.batch_size.max(1)) {
        total += retriever.embed_and_index(batch).await?;
        tracing::info!(indexed = total, "progress");
    }

    tracing::info!(total, "ingestion complete");
    Ok(())
}
