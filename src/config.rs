//! This module provides functionality for loading and handling the application's configuration.
//!
//! It defines the [`ChatbotConfig`] struct, which holds the configuration parameters,
//! and a [`load_config`] function to load the configuration from a YAML file.
//!
//! # Examples
//!
//! Loading the configuration from a file:
//!
//! ```no_run
//! use rag_chatbot::config::{ChatbotConfig, load_config};
//!
//! let config: ChatbotConfig = load_config("/path/to/config.yaml").unwrap();
//! println!("{:?}", config);
//! ```

use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};

use tracing::*;

use crate::error::{ChatbotError, Result};

/// Which embedding backend turns text into vectors.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// all-MiniLM-L6-v2 run in-process with Candle.
    #[default]
    Local,
    /// The `/embeddings` endpoint of the configured OpenAI compatible API.
    #[value(name = "openai")]
    OpenAi,
}

/// Where the retrieved documents of each turn are rendered.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DocumentLogMode {
    /// Print a search results block to stdout before the answer.
    #[default]
    Console,
    /// Emit the documents as `tracing` debug events.
    Log,
    /// Do not render retrieved documents.
    Off,
}

/// Settings for the token based text splitter.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct SplitterConfig {
    /// Maximum tokens per chunk.
    pub chunk_size: usize,
    /// A chunk is only cut at punctuation found past this many characters.
    pub min_chunk_size_chars: usize,
    /// Chunks this short or shorter are dropped.
    pub min_chunk_length_to_embed: usize,
    /// Upper bound on chunks produced from one document.
    pub max_num_chunks: usize,
    /// Keep newlines inside chunks instead of folding them into spaces.
    pub keep_separator: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            min_chunk_size_chars: 350,
            min_chunk_length_to_embed: 5,
            max_num_chunks: 10_000,
            keep_separator: true,
        }
    }
}

/// Settings for the embedding backend.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    /// Model name sent to the remote provider; ignored by the local one.
    pub model: String,
    /// Vector length the provider produces. Unset means the provider's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
}

impl EmbeddingConfig {
    /// The configured dimension, or 384 for `local` and 1536 for `openai`.
    pub fn resolved_dimension(&self) -> usize {
        self.dimension.unwrap_or(match self.provider {
            EmbeddingProvider::Local => 384,
            EmbeddingProvider::OpenAi => 1536,
        })
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Local,
            model: "text-embedding-3-small".to_string(),
            dimension: None,
        }
    }
}

/// Represents the application's configuration.
///
/// Only the API fields are required in the YAML file; everything else has a
/// default that reproduces the hurricane assistant.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct ChatbotConfig {
    /// Banner printed once when the chat loop starts.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// The base URL of the API.
    pub api_base: String,

    /// The API key used to authenticate requests. Empty means `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: String,

    /// The name of the model to be used for generating responses.
    pub model: String,

    /// Sampling temperature forwarded to the model, if set.
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Fixed instruction sent as the system message of every call.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Glob resolving to the corpus files.
    #[serde(default = "default_documents_location_pattern")]
    pub documents_location_pattern: String,

    /// Minimum cosine similarity for a chunk to be used.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Maximum chunks retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// How many conversation turns the chat memory keeps.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    #[serde(default)]
    pub splitter: SplitterConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub document_log: DocumentLogMode,

    /// Where to cache the indexed corpus between runs.
    #[serde(default)]
    pub vector_store_path: Option<PathBuf>,
}

fn default_application_name() -> String {
    "I am your Hurricane Milton assistant.".to_string()
}

fn default_system_prompt() -> String {
    "You are useful assistant, expert in hurricanes.".to_string()
}

fn default_documents_location_pattern() -> String {
    "documents/*.pdf".to_string()
}

fn default_similarity_threshold() -> f32 {
    0.5
}

fn default_top_k() -> usize {
    4
}

fn default_window_size() -> usize {
    10
}

impl Default for ChatbotConfig {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            temperature: None,
            system_prompt: default_system_prompt(),
            documents_location_pattern: default_documents_location_pattern(),
            similarity_threshold: default_similarity_threshold(),
            top_k: default_top_k(),
            window_size: default_window_size(),
            splitter: SplitterConfig::default(),
            embedding: EmbeddingConfig::default(),
            document_log: DocumentLogMode::default(),
            vector_store_path: None,
        }
    }
}

impl ChatbotConfig {
    /// Check ranges the rest of the crate relies on.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ChatbotError::Config(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.window_size == 0 {
            return Err(ChatbotError::Config("window_size must be at least 1".into()));
        }
        if self.top_k == 0 {
            return Err(ChatbotError::Config("top_k must be at least 1".into()));
        }
        if self.splitter.chunk_size == 0 {
            return Err(ChatbotError::Config(
                "splitter.chunk_size must be at least 1".into(),
            ));
        }
        if self.embedding.dimension == Some(0) {
            return Err(ChatbotError::Config(
                "embedding.dimension must be at least 1".into(),
            ));
        }
        if self.documents_location_pattern.trim().is_empty() {
            return Err(ChatbotError::Config(
                "documents_location_pattern is empty".into(),
            ));
        }
        Ok(())
    }

    /// The API key to send, falling back to `OPENAI_API_KEY` when the file leaves it blank.
    pub fn resolved_api_key(&self) -> String {
        if self.api_key.is_empty() {
            env::var("OPENAI_API_KEY").unwrap_or_default()
        } else {
            self.api_key.clone()
        }
    }
}

/// Loads the application's configuration from a YAML file.
///
/// # Errors
///
/// Fails when the file cannot be read, is not valid YAML, or does not pass
/// [`ChatbotConfig::validate`].
///
/// # Examples
///
/// ```no_run
/// use rag_chatbot::config::load_config;
///
/// match load_config("/path/to/config.yaml") {
///     Ok(config) => println!("{:?}", config),
///     Err(err) => eprintln!("Error loading config: {}", err),
/// }
/// ```
pub fn load_config(file: &str) -> Result<ChatbotConfig> {
    debug!("Loading config from: {}", file);
    let content = fs::read_to_string(file)?;
    let config: ChatbotConfig = serde_yaml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
