use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub openai_api_key: String,
    /// Override for the OpenAI base URL (proxies, compatible providers).
    pub openai_base_url: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    /// Number of knowledge-base passages retrieved per query.
    pub retrieval_top_k: usize,
    /// Total wall-clock budget for one request, in seconds.
    pub request_timeout_secs: u64,
    /// Directory scanned by the ingest_docs binary.
    pub docs_dir: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            openai_base_url: env::var("OPENAI_BASE_URL").ok(),
            chat_model: env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            retrieval_top_k: env::var("RETRIEVAL_TOP_K")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("RETRIEVAL_TOP_K must be a valid number")?,
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a valid number")?,
            docs_dir: env::var("DOCS_DIR").unwrap_or_else(|_| "./docs".to_string()),
        })
    }
}
