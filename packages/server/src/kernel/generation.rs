//! Answer generation contract.
//!
//! One model call produces the answer, topical tags, and a confidence level
//! together (one round trip instead of two). The combined output contract is
//! fragile, so parsing is best-effort: malformed model output degrades to a
//! low-confidence fallback instead of an error.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use openai_client::{strip_code_blocks, ChatRequest, Message, OpenAIClient};

use crate::kernel::prompts;
use crate::kernel::retrieval::RetrievedPassage;

/// Model-reported reliability of a generated answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Confidence::Low),
            "medium" => Some(Confidence::Medium),
            "high" => Some(Confidence::High),
            _ => None,
        }
    }
}

/// One prior turn of caller-maintained conversation memory.
///
/// Supplied per-request; never persisted server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// "user" or "assistant"
    pub role: String,
    pub content: String,
}

/// Structured generation result.
#[derive(Debug, Clone)]
pub struct RagResponse {
    pub answer: String,
    /// Insertion order = relevance order; never contains duplicates.
    pub tags: Vec<String>,
    pub confidence: Confidence,
}

impl RagResponse {
    /// True when the model declared the context insufficient.
    pub fn is_insufficient(&self) -> bool {
        self.answer.contains(prompts::INSUFFICIENT_CONTEXT)
    }
}

/// Errors from the generation layer.
///
/// Malformed output is not an error; it becomes a [`ModelOutput::Fallback`].
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Provider unreachable, errored, or timed out.
    #[error("generation provider unavailable: {0}")]
    Unavailable(String),
}

// =============================================================================
// Output parsing
// =============================================================================

/// Tagged outcome of parsing the model's combined output.
#[derive(Debug)]
pub enum ModelOutput {
    /// Output matched the JSON contract.
    Parsed(RagResponse),
    /// Output did not parse; the raw text stands in as the answer.
    Fallback { raw: String },
}

impl ModelOutput {
    /// Collapse into a well-formed response. Fallback yields the raw text,
    /// no tags, and low confidence.
    pub fn into_response(self) -> RagResponse {
        match self {
            ModelOutput::Parsed(response) => response,
            ModelOutput::Fallback { raw } => RagResponse {
                answer: raw,
                tags: Vec::new(),
                confidence: Confidence::Low,
            },
        }
    }
}

#[derive(Deserialize)]
struct RagPayload {
    answer: String,
    tags: Vec<String>,
    confidence: String,
}

/// Best-effort parse of the model's combined JSON output.
///
/// Strips code fences, parses, and validates the confidence value. Any
/// failure produces a deterministic fallback; this never errors.
pub fn parse_model_output(raw: &str) -> ModelOutput {
    let cleaned = strip_code_blocks(raw);

    let payload: RagPayload = match serde_json::from_str(cleaned) {
        Ok(payload) => payload,
        Err(_) => {
            return ModelOutput::Fallback {
                raw: raw.trim().to_string(),
            }
        }
    };

    let confidence = match Confidence::parse(&payload.confidence) {
        Some(confidence) => confidence,
        None => {
            return ModelOutput::Fallback {
                raw: raw.trim().to_string(),
            }
        }
    };

    ModelOutput::Parsed(RagResponse {
        answer: payload.answer,
        tags: dedup_tags(payload.tags),
        confidence,
    })
}

/// Drop duplicate tags while preserving insertion order.
pub fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

// =============================================================================
// Service trait + implementations
// =============================================================================

/// Capability interface for answer generation.
///
/// Abstracts the backing provider so the triage workflow and the RAG route
/// never depend on a concrete LLM client.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generate an answer, tags, and confidence from the query, retrieved
    /// context, and optional prior conversation turns.
    async fn generate_rag_response(
        &self,
        query: &str,
        context: &[RetrievedPassage],
        history: &[ConversationTurn],
    ) -> Result<RagResponse, GenerationError>;
}

/// OpenAI-backed generation service.
pub struct OpenAIGenerationService {
    client: std::sync::Arc<OpenAIClient>,
    model: String,
}

impl OpenAIGenerationService {
    pub fn new(client: std::sync::Arc<OpenAIClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl GenerationService for OpenAIGenerationService {
    async fn generate_rag_response(
        &self,
        query: &str,
        context: &[RetrievedPassage],
        history: &[ConversationTurn],
    ) -> Result<RagResponse, GenerationError> {
        let request = ChatRequest::new(&self.model).messages(vec![
            Message::system(prompts::TRIAGE_SYSTEM_PROMPT),
            Message::user(prompts::build_user_prompt(context, history, query)),
        ]);

        let response = self
            .client
            .chat_completion(request)
            .await
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;

        let output = parse_model_output(&response.content);
        if let ModelOutput::Fallback { .. } = output {
            debug!("model output did not match the JSON contract, using fallback");
        }

        Ok(output.into_response())
    }
}

/// Mock generation service for testing.
#[derive(Default)]
pub struct MockGenerationService {
    response: Option<RagResponse>,
    fail: bool,
}

impl MockGenerationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return this response for every call.
    pub fn with_response(mut self, response: RagResponse) -> Self {
        self.response = Some(response);
        self
    }

    /// Fail every call with [`GenerationError::Unavailable`].
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl GenerationService for MockGenerationService {
    async fn generate_rag_response(
        &self,
        _query: &str,
        _context: &[RetrievedPassage],
        _history: &[ConversationTurn],
    ) -> Result<RagResponse, GenerationError> {
        if self.fail {
            return Err(GenerationError::Unavailable("mock failure".into()));
        }
        Ok(self.response.clone().unwrap_or(RagResponse {
            answer: prompts::INSUFFICIENT_CONTEXT.to_string(),
            tags: Vec::new(),
            confidence: Confidence::Low,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
        assert!(Confidence::Medium >= Confidence::Medium);
    }

    #[test]
    fn test_parse_valid_output() {
        let raw = r#"{"answer": "Reset via /forgot-password.", "tags": ["password-reset", "authentication"], "confidence": "high"}"#;
        match parse_model_output(raw) {
            ModelOutput::Parsed(response) => {
                assert_eq!(response.answer, "Reset via /forgot-password.");
                assert_eq!(response.tags, vec!["password-reset", "authentication"]);
                assert_eq!(response.confidence, Confidence::High);
            }
            ModelOutput::Fallback { .. } => panic!("expected parsed output"),
        }
    }

    #[test]
    fn test_parse_fenced_output() {
        let raw = "```json\n{\"answer\": \"ok\", \"tags\": [], \"confidence\": \"medium\"}\n```";
        let response = parse_model_output(raw).into_response();
        assert_eq!(response.answer, "ok");
        assert_eq!(response.confidence, Confidence::Medium);
    }

    #[test]
    fn test_parse_malformed_output_falls_back() {
        let response = parse_model_output("Sorry, I cannot help with that.").into_response();
        assert_eq!(response.answer, "Sorry, I cannot help with that.");
        assert!(response.tags.is_empty());
        assert_eq!(response.confidence, Confidence::Low);
    }

    #[test]
    fn test_parse_invalid_confidence_falls_back() {
        let raw = r#"{"answer": "ok", "tags": [], "confidence": "certain"}"#;
        assert!(matches!(
            parse_model_output(raw),
            ModelOutput::Fallback { .. }
        ));
    }

    #[test]
    fn test_parse_dedups_tags_preserving_order() {
        let raw = r#"{"answer": "ok", "tags": ["billing", "urgent", "billing"], "confidence": "high"}"#;
        let response = parse_model_output(raw).into_response();
        assert_eq!(response.tags, vec!["billing", "urgent"]);
    }

    #[test]
    fn test_insufficient_context_marker() {
        let response = RagResponse {
            answer: prompts::INSUFFICIENT_CONTEXT.to_string(),
            tags: vec![],
            confidence: Confidence::Low,
        };
        assert!(response.is_insufficient());
    }

    #[tokio::test]
    async fn test_mock_generation_failure() {
        let service = MockGenerationService::new().failing();
        let err = service
            .generate_rag_response("q", &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Unavailable(_)));
    }
}
