// Support Desk Triage - API Core
//
// This crate provides the backend API for AI-assisted support ticket triage:
// knowledge-base retrieval, answer generation, action selection, and ticket
// persistence with human feedback.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
