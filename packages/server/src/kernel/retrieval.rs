//! Knowledge-base retrieval.
//!
//! Abstracts over the vector-similarity search backing the RAG pipeline so
//! the workflow never depends on a concrete provider. The production
//! implementation runs pgvector cosine search over the `kb_passages` table;
//! tests use [`MockRetriever`].
//!
//! Retrieval failure is never fatal for a request: callers treat
//! [`RetrievalError`] as "no context available" and proceed with an empty
//! passage set.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info};

use openai_client::OpenAIClient;

/// Embedding dimension for text-embedding-3-small.
pub const EMBEDDING_DIM: usize = 1536;

/// One knowledge-base match returned by similarity search.
///
/// Transient: lives only for the duration of one request.
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    /// Name of the source document (e.g., file name).
    pub source_name: String,

    /// Raw passage text.
    pub text: String,

    /// Similarity score, higher = more relevant.
    pub score: f32,
}

/// A document chunk headed for the index.
#[derive(Debug, Clone)]
pub struct KnowledgeDocument {
    /// Stable upsert key (e.g., "guide.txt#3"). Re-ingesting the same id
    /// replaces the stored passage.
    pub id: String,

    /// Name of the source document.
    pub source_name: String,

    /// Chunk text.
    pub text: String,
}

/// Errors from the retrieval layer.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The vector-search provider is unreachable or returned garbage.
    #[error("vector search unavailable: {0}")]
    Unavailable(String),

    /// Query or document embedding failed.
    #[error("embedding error: {0}")]
    Embedding(String),
}

/// Vector-similarity search over the knowledge base.
///
/// `query_similar` is the request-time path; `embed_and_index` is the
/// batch/offline ingestion path and is never called by the triage workflow.
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    /// Return up to `top_k` passages ordered by descending similarity.
    async fn query_similar(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError>;

    /// Embed documents and upsert them into the index. Returns the count indexed.
    async fn embed_and_index(
        &self,
        documents: &[KnowledgeDocument],
    ) -> Result<usize, RetrievalError>;
}

// =============================================================================
// pgvector implementation
// =============================================================================

/// Postgres + pgvector backed retriever.
///
/// Query embeddings come from the OpenAI embeddings API; similarity is
/// cosine (`<=>` operator), reported as `1 - distance`.
pub struct PgVectorRetriever {
    pool: PgPool,
    openai: Arc<OpenAIClient>,
    embedding_model: String,
}

impl PgVectorRetriever {
    pub fn new(pool: PgPool, openai: Arc<OpenAIClient>, embedding_model: impl Into<String>) -> Self {
        Self {
            pool,
            openai,
            embedding_model: embedding_model.into(),
        }
    }

    /// Create the pgvector extension, passage table, and index if absent.
    pub async fn ensure_schema(pool: &PgPool) -> anyhow::Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(pool)
            .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS kb_passages (
                id TEXT PRIMARY KEY,
                source_name TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding vector({EMBEDDING_DIM}) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#
        ))
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS kb_passages_embedding_idx
             ON kb_passages USING hnsw (embedding vector_cosine_ops)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        self.openai
            .create_embeddings(texts, &self.embedding_model)
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))
    }
}

#[async_trait]
impl KnowledgeRetriever for PgVectorRetriever {
    async fn query_similar(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        let embedding = self.embed(std::slice::from_ref(&query.to_string())).await?;
        let vector = Vector::from(embedding.into_iter().next().unwrap_or_default());

        let rows: Vec<(String, String, f64)> = sqlx::query_as(
            r#"
            SELECT source_name, content, 1 - (embedding <=> $1) AS score
            FROM kb_passages
            ORDER BY embedding <=> $1
            LIMIT $2
            "#,
        )
        .bind(&vector)
        .bind(top_k as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        debug!(query_len = query.len(), matches = rows.len(), "similarity search");

        Ok(rows
            .into_iter()
            .map(|(source_name, text, score)| RetrievedPassage {
                source_name,
                text,
                score: score as f32,
            })
            .collect())
    }

    async fn embed_and_index(
        &self,
        documents: &[KnowledgeDocument],
    ) -> Result<usize, RetrievalError> {
        if documents.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = self.embed(&texts).await?;

        for (doc, embedding) in documents.iter().zip(embeddings) {
            sqlx::query(
                r#"
                INSERT INTO kb_passages (id, source_name, content, embedding)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO UPDATE
                SET source_name = EXCLUDED.source_name,
                    content = EXCLUDED.content,
                    embedding = EXCLUDED.embedding
                "#,
            )
            .bind(&doc.id)
            .bind(&doc.source_name)
            .bind(&doc.text)
            .bind(Vector::from(embedding))
            .execute(&self.pool)
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;
        }

        info!(count = documents.len(), "indexed knowledge documents");
        Ok(documents.len())
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock retriever for testing.
#[derive(Default)]
pub struct MockRetriever {
    passages: Vec<RetrievedPassage>,
    fail: bool,
    indexed: RwLock<Vec<KnowledgeDocument>>,
}

impl MockRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return these passages for every query.
    pub fn with_passages(mut self, passages: Vec<RetrievedPassage>) -> Self {
        self.passages = passages;
        self
    }

    /// Fail every call with [`RetrievalError::Unavailable`].
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Documents passed to `embed_and_index` so far.
    pub fn indexed(&self) -> Vec<KnowledgeDocument> {
        self.indexed.read().unwrap().clone()
    }
}

#[async_trait]
impl KnowledgeRetriever for MockRetriever {
    async fn query_similar(
        &self,
        _query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        if self.fail {
            return Err(RetrievalError::Unavailable("mock failure".into()));
        }
        Ok(self.passages.iter().take(top_k).cloned().collect())
    }

    async fn embed_and_index(
        &self,
        documents: &[KnowledgeDocument],
    ) -> Result<usize, RetrievalError> {
        if self.fail {
            return Err(RetrievalError::Unavailable("mock failure".into()));
        }
        self.indexed.write().unwrap().extend_from_slice(documents);
        Ok(documents.len())
    }
}

// =============================================================================
// Chunking
// =============================================================================

/// Split document content into chunks of at most `max_chars` characters.
///
/// Splits on character boundaries; empty and whitespace-only chunks are
/// dropped. Used by the ingestion path only.
pub fn chunk_text(content: &str, max_chars: usize) -> Vec<String> {
    if content.trim().is_empty() || max_chars == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = content.chars().collect();
    chars
        .chunks(max_chars)
        .map(|c| c.iter().collect::<String>().trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, text: &str) -> KnowledgeDocument {
        KnowledgeDocument {
            id: id.into(),
            source_name: "doc.txt".into(),
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn test_mock_retriever_returns_top_k() {
        let retriever = MockRetriever::new().with_passages(vec![
            RetrievedPassage {
                source_name: "a.txt".into(),
                text: "first".into(),
                score: 0.9,
            },
            RetrievedPassage {
                source_name: "b.txt".into(),
                text: "second".into(),
                score: 0.8,
            },
            RetrievedPassage {
                source_name: "c.txt".into(),
                text: "third".into(),
                score: 0.7,
            },
        ]);

        let results = retriever.query_similar("anything", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source_name, "a.txt");
    }

    #[tokio::test]
    async fn test_mock_retriever_failure() {
        let retriever = MockRetriever::new().failing();
        let err = retriever.query_similar("anything", 5).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_mock_retriever_records_indexed_docs() {
        let retriever = MockRetriever::new();
        let count = retriever
            .embed_and_index(&[doc("a#0", "alpha"), doc("a#1", "beta")])
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(retriever.indexed().len(), 2);
    }

    #[test]
    fn test_chunk_text_splits_and_trims() {
        let chunks = chunk_text("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_chunk_text_empty_input() {
        assert!(chunk_text("", 100).is_empty());
        assert!(chunk_text("   \n  ", 100).is_empty());
    }

    #[test]
    fn test_chunk_text_multibyte() {
        // 4 chars per chunk, never splitting inside a character.
        let chunks = chunk_text("日本語のテキスト", 4);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "日本語の");
    }
}
