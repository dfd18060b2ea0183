use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Action the triage workflow selected for a ticket.
///
/// `Close` is reserved for a future explicit "no action needed" signal;
/// the current decision rule only ever emits `Reply` or `Escalate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketAction {
    Reply,
    Escalate,
    Close,
}

impl TicketAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketAction::Reply => "reply",
            TicketAction::Escalate => "escalate",
            TicketAction::Close => "close",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reply" => Some(TicketAction::Reply),
            "escalate" => Some(TicketAction::Escalate),
            "close" => Some(TicketAction::Close),
            _ => None,
        }
    }
}

/// One processed support ticket.
///
/// `action` and `reply` are set once at creation; `human_label` is the only
/// field mutated afterward. `reply` is present iff `action == Reply`.
#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub id: i64,
    pub text: String,
    pub action: TicketAction,
    pub reply: Option<String>,
    pub reason: String,
    pub tags: Vec<String>,
    pub human_label: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a ticket; the store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub text: String,
    pub action: TicketAction,
    pub reply: Option<String>,
    pub reason: String,
    pub tags: Vec<String>,
}
