//! # Errors
//!
//! A single error type for the library side of the chatbot. Startup failures
//! (config, corpus, embeddings) bubble up to `main` and abort; per-turn
//! failures ([`ChatbotError::OpenAi`], [`ChatbotError::Model`]) are caught by
//! the chat loop and reported without ending the session.

use thiserror::Error;

/// Everything that can go wrong between loading the config and finishing a turn.
#[derive(Debug, Error)]
pub enum ChatbotError {
    /// The configuration is missing a value or holds one out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The documents location pattern is not a valid glob.
    #[error("invalid documents location pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// The documents location pattern resolved to nothing readable.
    #[error("no documents matched `{0}`")]
    NoDocuments(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read PDF {path}: {message}")]
    Pdf { path: String, message: String },

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The persisted vector store snapshot could not be written or read back.
    #[error("vector store snapshot error: {0}")]
    Snapshot(String),

    #[error(transparent)]
    OpenAi(#[from] async_openai::error::OpenAIError),

    /// The chat model failed while producing a response.
    #[error("chat model error: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, ChatbotError>;
