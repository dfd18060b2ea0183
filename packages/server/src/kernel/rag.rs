//! Retrieval-augmented answer assembly.
//!
//! Combines the knowledge retriever and the generation service into a single
//! `answer` operation used by both the `/rag/query` route and the triage
//! workflow. Retrieval failure degrades to an empty context set; only
//! generation failure propagates.

use std::sync::Arc;

use tracing::warn;

use crate::kernel::generation::{
    dedup_tags, Confidence, ConversationTurn, GenerationError, GenerationService,
};
use crate::kernel::retrieval::{KnowledgeRetriever, RetrievedPassage};

/// A complete RAG answer with its supporting sources.
#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    pub tags: Vec<String>,
    pub confidence: Confidence,
    /// Passages the answer was conditioned on, most relevant first.
    pub sources: Vec<RetrievedPassage>,
    /// True when retrieval was unavailable and the answer is context-free.
    pub degraded: bool,
}

/// Orchestrates retrieve-then-generate.
///
/// Constructed once by the composition root and shared; both dependencies
/// are injected explicitly.
pub struct RagService {
    retriever: Arc<dyn KnowledgeRetriever>,
    generation: Arc<dyn GenerationService>,
    top_k: usize,
}

impl RagService {
    pub fn new(
        retriever: Arc<dyn KnowledgeRetriever>,
        generation: Arc<dyn GenerationService>,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            generation,
            top_k,
        }
    }

    /// Answer a query using retrieval-augmented generation.
    ///
    /// A retrieval failure is downgraded to "no context available" and the
    /// generation step still runs, yielding a lower-confidence answer.
    pub async fn answer(
        &self,
        query: &str,
        history: &[ConversationTurn],
    ) -> Result<RagAnswer, GenerationError> {
        let (passages, degraded) = match self.retriever.query_similar(query, self.top_k).await {
            Ok(passages) => (passages, false),
            Err(e) => {
                warn!(error = %e, "retrieval unavailable, generating without context");
                (Vec::new(), true)
            }
        };

        let response = self
            .generation
            .generate_rag_response(query, &passages, history)
            .await?;

        Ok(RagAnswer {
            answer: response.answer,
            tags: dedup_tags(response.tags),
            confidence: response.confidence,
            sources: passages,
            degraded,
        })
    }
}
