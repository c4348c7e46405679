//! Error types for Quest.
//!
//! Defines the main error enum used by the application plumbing. The pipeline
//! itself reports failures through its own tagged outcome types; this enum
//! covers everything around it (startup, configuration, IO, client setup).

use thiserror::Error;

/// Main error type for Quest operations.
#[derive(Error, Debug)]
pub enum QuestError {
    /// Schema catalog errors (missing file, malformed JSON, empty catalog).
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Data store errors surfaced outside the pipeline (health check, setup).
    #[error("Store error: {0}")]
    Store(String),

    /// LLM API errors (rate limits, auth, timeouts, etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audit log errors (cannot open or append to the trail).
    #[error("Audit error: {0}")]
    Audit(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuestError {
    /// Creates a catalog error with the given message.
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Creates a store error with the given message.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an audit error with the given message.
    pub fn audit(msg: impl Into<String>) -> Self {
        Self::Audit(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Catalog(_) => "Catalog Error",
            Self::Store(_) => "Store Error",
            Self::Llm(_) => "LLM Error",
            Self::Config(_) => "Configuration Error",
            Self::Audit(_) => "Audit Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using QuestError.
pub type Result<T> = std::result::Result<T, QuestError>;
