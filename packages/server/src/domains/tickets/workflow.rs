//! Ticket triage workflow.
//!
//! Each ticket is processed to completion synchronously within one request:
//! validate, run RAG, apply the decision rule, persist, return. Upstream
//! failures are converted into a degraded (escalated) ticket so a human can
//! act on it; only validation and persistence failures reach the caller.

use std::sync::Arc;

use tracing::{info, warn};

use crate::common::ApiError;
use crate::kernel::generation::{dedup_tags, Confidence};
use crate::kernel::rag::{RagAnswer, RagService};

use super::model::{NewTicket, Ticket, TicketAction};
use super::store::TicketStore;

/// Outcome of the decision rule, before persistence.
#[derive(Debug)]
struct Decision {
    action: TicketAction,
    reply: Option<String>,
    reason: String,
    tags: Vec<String>,
}

/// Orchestrates RAG and persistence to triage support tickets.
pub struct TriageService {
    rag: Arc<RagService>,
    store: Arc<dyn TicketStore>,
}

impl TriageService {
    pub fn new(rag: Arc<RagService>, store: Arc<dyn TicketStore>) -> Self {
        Self { rag, store }
    }

    /// Process a new ticket end-to-end and return the persisted record.
    pub async fn process_ticket(&self, text: &str) -> Result<Ticket, ApiError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ApiError::Validation(
                "ticket text must not be empty".to_string(),
            ));
        }

        // Fresh tickets carry no conversation history.
        let decision = match self.rag.answer(text, &[]).await {
            Ok(result) => Self::decide(result),
            Err(e) => {
                warn!(error = %e, "generation unavailable, escalating ticket");
                Decision {
                    action: TicketAction::Escalate,
                    reply: None,
                    reason: "Automated processing was unavailable; escalating to a human agent."
                        .to_string(),
                    tags: Vec::new(),
                }
            }
        };

        let ticket = self
            .store
            .create(NewTicket {
                text: text.to_string(),
                action: decision.action,
                reply: decision.reply,
                reason: decision.reason,
                tags: decision.tags,
            })
            .await?;

        info!(
            ticket_id = ticket.id,
            action = ticket.action.as_str(),
            "ticket triaged"
        );

        Ok(ticket)
    }

    /// Map a RAG result to an action.
    ///
    /// Replies only when the model produced a real answer with at least
    /// medium confidence. `Close` is reserved for a future explicit
    /// "no action needed" signal and is never emitted here.
    fn decide(result: RagAnswer) -> Decision {
        let tags = dedup_tags(result.tags);
        let answer = result.answer.trim();
        let insufficient = answer.contains(crate::kernel::prompts::INSUFFICIENT_CONTEXT);

        if !answer.is_empty() && !insufficient && result.confidence >= Confidence::Medium {
            return Decision {
                action: TicketAction::Reply,
                reply: Some(answer.to_string()),
                reason: "Generated reply using knowledge base context.".to_string(),
                tags,
            };
        }

        let reason = if insufficient {
            "Knowledge base lacks sufficient information; escalating to a human agent."
        } else if answer.is_empty() {
            "Could not generate an automated reply; escalating to a human agent."
        } else {
            "Answer confidence too low for an automated reply; escalating to a human agent."
        };

        Decision {
            action: TicketAction::Escalate,
            reply: None,
            reason: reason.to_string(),
            tags,
        }
    }

    /// Record human feedback on a ticket. Overwrites any earlier label.
    pub async fn submit_feedback(&self, ticket_id: i64, human_label: &str) -> Result<Ticket, ApiError> {
        let human_label = human_label.trim();
        if human_label.is_empty() {
            return Err(ApiError::Validation(
                "human_label must not be empty".to_string(),
            ));
        }

        Ok(self.store.set_feedback(ticket_id, human_label).await?)
    }

    /// Page of processed tickets, newest first.
    pub async fn list_tickets(&self, skip: i64, limit: i64) -> Result<Vec<Ticket>, ApiError> {
        Ok(self.store.list(skip, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::generation::{MockGenerationService, RagResponse};
    use crate::kernel::prompts::INSUFFICIENT_CONTEXT;
    use crate::kernel::retrieval::{MockRetriever, RetrievedPassage};
    use crate::domains::tickets::store::MemoryTicketStore;

    fn passage(text: &str) -> RetrievedPassage {
        RetrievedPassage {
            source_name: "kb.txt".into(),
            text: text.into(),
            score: 0.9,
        }
    }

    fn triage_with(
        retriever: MockRetriever,
        generation: MockGenerationService,
    ) -> (TriageService, Arc<MemoryTicketStore>) {
        let store = Arc::new(MemoryTicketStore::new());
        let rag = Arc::new(RagService::new(
            Arc::new(retriever),
            Arc::new(generation),
            5,
        ));
        (TriageService::new(rag, store.clone()), store)
    }

    #[tokio::test]
    async fn test_confident_answer_yields_reply() {
        let (triage, _) = triage_with(
            MockRetriever::new().with_passages(vec![passage("go to /forgot-password")]),
            MockGenerationService::new().with_response(RagResponse {
                answer: "Reset your password at /forgot-password.".into(),
                tags: vec!["authentication".into(), "password-reset".into()],
                confidence: Confidence::High,
            }),
        );

        let ticket = triage
            .process_ticket("I can't log into my account")
            .await
            .unwrap();

        assert_eq!(ticket.action, TicketAction::Reply);
        assert!(ticket.reply.as_deref().unwrap().contains("/forgot-password"));
        assert_eq!(ticket.tags, vec!["authentication", "password-reset"]);
    }

    #[tokio::test]
    async fn test_insufficient_context_escalates_without_reply() {
        let (triage, _) = triage_with(
            MockRetriever::new(),
            MockGenerationService::new().with_response(RagResponse {
                answer: INSUFFICIENT_CONTEXT.into(),
                tags: vec!["needs-escalation".into()],
                confidence: Confidence::Low,
            }),
        );

        let ticket = triage.process_ticket("asdkjhasdkjh").await.unwrap();

        assert_eq!(ticket.action, TicketAction::Escalate);
        assert!(ticket.reply.is_none());
        assert!(ticket.reason.contains("lacks sufficient information"));
    }

    #[tokio::test]
    async fn test_low_confidence_escalates() {
        let (triage, _) = triage_with(
            MockRetriever::new(),
            MockGenerationService::new().with_response(RagResponse {
                answer: "maybe try restarting?".into(),
                tags: vec![],
                confidence: Confidence::Low,
            }),
        );

        let ticket = triage.process_ticket("my app is broken").await.unwrap();
        assert_eq!(ticket.action, TicketAction::Escalate);
        assert!(ticket.reply.is_none());
        assert!(ticket.reason.contains("confidence too low"));
    }

    #[tokio::test]
    async fn test_generation_failure_still_persists_ticket() {
        let (triage, store) = triage_with(
            MockRetriever::new(),
            MockGenerationService::new().failing(),
        );

        let ticket = triage.process_ticket("help me please").await.unwrap();

        assert_eq!(ticket.action, TicketAction::Escalate);
        assert!(ticket.reason.contains("unavailable"));
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn test_retrieval_failure_still_persists_ticket() {
        let (triage, store) = triage_with(
            MockRetriever::new().failing(),
            MockGenerationService::new(),
        );

        // Degrades to empty context, the default mock reports insufficient
        // context, and the ticket is escalated rather than erroring.
        let ticket = triage.process_ticket("anything at all").await.unwrap();
        assert_eq!(ticket.action, TicketAction::Escalate);
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected_before_any_call() {
        let (triage, store) = triage_with(MockRetriever::new(), MockGenerationService::new());

        let err = triage.process_ticket("   \n ").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn test_reply_never_coexists_with_escalate() {
        let (triage, _) = triage_with(
            MockRetriever::new(),
            MockGenerationService::new().with_response(RagResponse {
                answer: "".into(),
                tags: vec![],
                confidence: Confidence::High,
            }),
        );

        let ticket = triage.process_ticket("empty answer case").await.unwrap();
        assert_eq!(ticket.action, TicketAction::Escalate);
        assert!(ticket.reply.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_tags_are_dropped() {
        let (triage, _) = triage_with(
            MockRetriever::new(),
            MockGenerationService::new().with_response(RagResponse {
                answer: "answer".into(),
                tags: vec!["billing".into(), "billing".into()],
                confidence: Confidence::High,
            }),
        );

        let ticket = triage.process_ticket("billing question").await.unwrap();
        assert_eq!(ticket.tags, vec!["billing"]);
    }

    #[tokio::test]
    async fn test_feedback_round_trip() {
        let (triage, _) = triage_with(
            MockRetriever::new(),
            MockGenerationService::new().with_response(RagResponse {
                answer: "answer".into(),
                tags: vec![],
                confidence: Confidence::High,
            }),
        );

        let ticket = triage.process_ticket("a question").await.unwrap();

        let updated = triage.submit_feedback(ticket.id, "correct").await.unwrap();
        assert_eq!(updated.human_label.as_deref(), Some("correct"));

        let err = triage.submit_feedback(9999, "correct").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = triage.submit_feedback(ticket.id, "  ").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
