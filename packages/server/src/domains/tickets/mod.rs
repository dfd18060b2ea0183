// Tickets domain: model, durable store, and the triage workflow.

pub mod model;
pub mod store;
pub mod workflow;

pub use model::{NewTicket, Ticket, TicketAction};
pub use store::{MemoryTicketStore, PostgresTicketStore, StoreError, TicketStore};
pub use workflow::TriageService;
