//! Application setup and composition root.
//!
//! All dependencies are constructed here and injected explicitly; nothing
//! in the crate holds ambient global state.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use openai_client::OpenAIClient;

use crate::config::Config;
use crate::domains::tickets::{PostgresTicketStore, TicketStore, TriageService};
use crate::kernel::{OpenAIGenerationService, PgVectorRetriever, RagService};
use crate::server::routes::{
    health_handler, list_tickets_handler, process_ticket_handler, rag_query_handler,
    submit_feedback_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub rag: Arc<RagService>,
    pub triage: Arc<TriageService>,
}

/// Wire the concrete providers into the service graph.
pub fn build_state(pool: PgPool, config: &Config) -> anyhow::Result<AppState> {
    let mut openai = OpenAIClient::new(config.openai_api_key.clone())
        .with_timeout(Duration::from_secs(config.request_timeout_secs))
        .map_err(|e| anyhow::anyhow!(e))?;
    if let Some(base_url) = &config.openai_base_url {
        openai = openai.with_base_url(base_url.clone());
    }
    let openai = Arc::new(openai);

    let retriever = Arc::new(PgVectorRetriever::new(
        pool.clone(),
        openai.clone(),
        config.embedding_model.clone(),
    ));
    let generation = Arc::new(OpenAIGenerationService::new(
        openai,
        config.chat_model.clone(),
    ));

    let rag = Arc::new(RagService::new(retriever, generation, config.retrieval_top_k));
    let store: Arc<dyn TicketStore> = Arc::new(PostgresTicketStore::new(pool.clone()));
    let triage = Arc::new(TriageService::new(rag.clone(), store));

    Ok(AppState {
        db_pool: pool,
        rag,
        triage,
    })
}

/// Build the Axum application router
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/rag/query", post(rag_query_handler))
        .route("/tickets/agent", post(process_ticket_handler))
        .route("/tickets/feedback", post(submit_feedback_handler))
        .route("/tickets", get(list_tickets_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(Extension(state))
}
