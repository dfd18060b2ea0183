//! Error types for the OpenAI client.

use thiserror::Error;

/// Errors returned by [`crate::OpenAIClient`].
#[derive(Debug, Error)]
pub enum OpenAIError {
    /// Request never reached the API (DNS, connect, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The API returned a non-success status.
    #[error("OpenAI API error: {0}")]
    Api(String),

    /// The API response could not be deserialized.
    #[error("parse error: {0}")]
    Parse(String),

    /// Client misconfiguration (missing key, bad base URL).
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, OpenAIError>;
