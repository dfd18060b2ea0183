use axum::{extract::Extension, Json};
use serde::{Deserialize, Serialize};

use crate::common::ApiError;
use crate::kernel::ConversationTurn;
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct RagQueryRequest {
    pub query: String,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize)]
pub struct RagSource {
    pub doc_name: String,
    pub snippet: String,
}

#[derive(Debug, Serialize)]
pub struct RagQueryResponse {
    pub answer: String,
    pub sources: Vec<RagSource>,
}

/// Run a RAG query with optional caller-maintained conversation history.
///
/// Unlike the ticket path there is no degraded fallback here, so a
/// generation failure surfaces as an upstream error.
pub async fn rag_query_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<RagQueryRequest>,
) -> Result<Json<RagQueryResponse>, ApiError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::Validation(
            "query must not be empty".to_string(),
        ));
    }

    let result = state
        .rag
        .answer(query, &request.conversation_history)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let sources = result
        .sources
        .into_iter()
        .map(|p| RagSource {
            doc_name: p.source_name,
            snippet: p.text,
        })
        .collect();

    Ok(Json(RagQueryResponse {
        answer: result.answer,
        sources,
    }))
}
