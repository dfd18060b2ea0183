//! Durable ticket storage.
//!
//! Tickets are append-only at creation; the only later mutation is the
//! human feedback label, which overwrites (last write wins). Listing is
//! newest-first (`created_at DESC, id DESC`) with skip/limit pagination.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use thiserror::Error;

use super::model::{NewTicket, Ticket, TicketAction};

/// Errors from the ticket store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ticket not found: {0}")]
    NotFound(i64),

    #[error("storage error: {0}")]
    Persistence(#[source] anyhow::Error),
}

/// Durable record of processed tickets.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Persist a new ticket and return it with its assigned id.
    async fn create(&self, new_ticket: NewTicket) -> Result<Ticket, StoreError>;

    /// Fetch one ticket by id.
    async fn find_by_id(&self, id: i64) -> Result<Ticket, StoreError>;

    /// Page of tickets, newest first.
    async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Ticket>, StoreError>;

    /// Overwrite the human feedback label and return the updated ticket.
    async fn set_feedback(&self, id: i64, human_label: &str) -> Result<Ticket, StoreError>;
}

// =============================================================================
// Postgres implementation
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: i64,
    text: String,
    action: String,
    reply: Option<String>,
    reason: String,
    tags: Json<Vec<String>>,
    human_label: Option<String>,
    created_at: DateTime<Utc>,
}

impl TicketRow {
    fn into_ticket(self) -> Result<Ticket, StoreError> {
        let action = TicketAction::parse(&self.action).ok_or_else(|| {
            StoreError::Persistence(anyhow::anyhow!(
                "unknown action '{}' for ticket {}",
                self.action,
                self.id
            ))
        })?;

        Ok(Ticket {
            id: self.id,
            text: self.text,
            action,
            reply: self.reply,
            reason: self.reason,
            tags: self.tags.0,
            human_label: self.human_label,
            created_at: self.created_at,
        })
    }
}

/// Postgres-backed ticket store.
pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tickets table if absent.
    pub async fn ensure_schema(pool: &PgPool) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                id BIGSERIAL PRIMARY KEY,
                text TEXT NOT NULL,
                action TEXT NOT NULL,
                reply TEXT,
                reason TEXT NOT NULL,
                tags JSONB NOT NULL DEFAULT '[]'::jsonb,
                human_label TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

fn persistence(e: sqlx::Error) -> StoreError {
    StoreError::Persistence(e.into())
}

#[async_trait]
impl TicketStore for PostgresTicketStore {
    async fn create(&self, new_ticket: NewTicket) -> Result<Ticket, StoreError> {
        let row: TicketRow = sqlx::query_as(
            r#"
            INSERT INTO tickets (text, action, reply, reason, tags)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&new_ticket.text)
        .bind(new_ticket.action.as_str())
        .bind(&new_ticket.reply)
        .bind(&new_ticket.reason)
        .bind(Json(&new_ticket.tags))
        .fetch_one(&self.pool)
        .await
        .map_err(persistence)?;

        row.into_ticket()
    }

    async fn find_by_id(&self, id: i64) -> Result<Ticket, StoreError> {
        let row: Option<TicketRow> = sqlx::query_as("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)?;

        row.ok_or(StoreError::NotFound(id))?.into_ticket()
    }

    async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Ticket>, StoreError> {
        let rows: Vec<TicketRow> = sqlx::query_as(
            "SELECT * FROM tickets ORDER BY created_at DESC, id DESC OFFSET $1 LIMIT $2",
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        rows.into_iter().map(TicketRow::into_ticket).collect()
    }

    async fn set_feedback(&self, id: i64, human_label: &str) -> Result<Ticket, StoreError> {
        let row: Option<TicketRow> =
            sqlx::query_as("UPDATE tickets SET human_label = $2 WHERE id = $1 RETURNING *")
                .bind(id)
                .bind(human_label)
                .fetch_optional(&self.pool)
                .await
                .map_err(persistence)?;

        row.ok_or(StoreError::NotFound(id))?.into_ticket()
    }
}

// =============================================================================
// In-memory implementation
// =============================================================================

/// In-memory ticket store for testing and development.
///
/// Matches the Postgres ordering semantics. Data is lost on restart.
#[derive(Default)]
pub struct MemoryTicketStore {
    tickets: RwLock<Vec<Ticket>>,
    next_id: AtomicI64,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self {
            tickets: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored tickets.
    pub fn count(&self) -> usize {
        self.tickets.read().unwrap().len()
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn create(&self, new_ticket: NewTicket) -> Result<Ticket, StoreError> {
        let ticket = Ticket {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            text: new_ticket.text,
            action: new_ticket.action,
            reply: new_ticket.reply,
            reason: new_ticket.reason,
            tags: new_ticket.tags,
            human_label: None,
            created_at: Utc::now(),
        };
        self.tickets.write().unwrap().push(ticket.clone());
        Ok(ticket)
    }

    async fn find_by_id(&self, id: i64) -> Result<Ticket, StoreError> {
        self.tickets
            .read()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Ticket>, StoreError> {
        // Ids are monotonically increasing, so reverse insertion order is
        // newest-first, same as the Postgres ordering.
        Ok(self
            .tickets
            .read()
            .unwrap()
            .iter()
            .rev()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn set_feedback(&self, id: i64, human_label: &str) -> Result<Ticket, StoreError> {
        let mut tickets = self.tickets.write().unwrap();
        let ticket = tickets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;
        ticket.human_label = Some(human_label.to_string());
        Ok(ticket.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_ticket(text: &str) -> NewTicket {
        NewTicket {
            text: text.into(),
            action: TicketAction::Escalate,
            reply: None,
            reason: "test".into(),
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let store = MemoryTicketStore::new();
        let a = store.create(new_ticket("first")).await.unwrap();
        let b = store.create(new_ticket("second")).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(a.human_label.is_none());
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let store = MemoryTicketStore::new();
        let created = store.create(new_ticket("hello")).await.unwrap();
        let found = store.find_by_id(created.id).await.unwrap();
        assert_eq!(found.text, "hello");

        let err = store.find_by_id(9999).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(9999)));
    }

    #[tokio::test]
    async fn test_list_newest_first_with_disjoint_pages() {
        let store = MemoryTicketStore::new();
        for i in 0..5 {
            store.create(new_ticket(&format!("ticket {}", i))).await.unwrap();
        }

        let first = store.list(0, 2).await.unwrap();
        let second = store.list(2, 2).await.unwrap();
        let third = store.list(4, 2).await.unwrap();

        let ids: Vec<i64> = first
            .iter()
            .chain(&second)
            .chain(&third)
            .map(|t| t.id)
            .collect();
        // Newest first, contiguous, no overlap.
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_feedback_overwrites() {
        let store = MemoryTicketStore::new();
        let ticket = store.create(new_ticket("hello")).await.unwrap();

        let updated = store.set_feedback(ticket.id, "incorrect").await.unwrap();
        assert_eq!(updated.human_label.as_deref(), Some("incorrect"));

        let updated = store.set_feedback(ticket.id, "correct").await.unwrap();
        assert_eq!(updated.human_label.as_deref(), Some("correct"));

        // Only the second label is retained.
        let found = store.find_by_id(ticket.id).await.unwrap();
        assert_eq!(found.human_label.as_deref(), Some("correct"));
    }

    #[tokio::test]
    async fn test_feedback_unknown_id() {
        let store = MemoryTicketStore::new();
        let err = store.set_feedback(9999, "correct").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(9999)));
    }
}
