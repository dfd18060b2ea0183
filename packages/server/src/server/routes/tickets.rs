use axum::extract::{Extension, Query};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{ApiError, PageParams};
use crate::domains::tickets::{Ticket, TicketAction};
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct TicketAgentRequest {
    pub ticket: String,
}

#[derive(Debug, Serialize)]
pub struct TicketAgentResponse {
    pub id: i64,
    pub action: TicketAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    pub reason: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TicketFeedbackRequest {
    pub ticket_id: i64,
    pub human_label: String,
}

/// Full ticket record returned by the feedback and listing endpoints.
#[derive(Debug, Serialize)]
pub struct TicketRecord {
    pub id: i64,
    pub text: String,
    pub action: TicketAction,
    pub reply: Option<String>,
    pub tags: Vec<String>,
    pub reason: String,
    pub human_label: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Ticket> for TicketRecord {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id,
            text: ticket.text,
            action: ticket.action,
            reply: ticket.reply,
            tags: ticket.tags,
            reason: ticket.reason,
            human_label: ticket.human_label,
            created_at: ticket.created_at,
        }
    }
}

/// Process a support ticket.
pub async fn process_ticket_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<TicketAgentRequest>,
) -> Result<Json<TicketAgentResponse>, ApiError> {
    let ticket = state.triage.process_ticket(&request.ticket).await?;

    Ok(Json(TicketAgentResponse {
        id: ticket.id,
        action: ticket.action,
        reply: ticket.reply,
        reason: ticket.reason,
        tags: ticket.tags,
    }))
}

/// Submit human feedback for a ticket. 404 if the id is unknown.
pub async fn submit_feedback_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<TicketFeedbackRequest>,
) -> Result<Json<TicketRecord>, ApiError> {
    let ticket = state
        .triage
        .submit_feedback(request.ticket_id, &request.human_label)
        .await?;

    Ok(Json(ticket.into()))
}

/// List tickets with skip/limit pagination, newest first.
pub async fn list_tickets_handler(
    Extension(state): Extension<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<TicketRecord>>, ApiError> {
    let params = params.clamp();
    let tickets = state.triage.list_tickets(params.skip, params.limit).await?;

    Ok(Json(tickets.into_iter().map(Into::into).collect()))
}
