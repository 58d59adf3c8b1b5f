//! # rag_chatbot (library root)
//!
//! A retrieval-augmented command-line chatbot for OpenAI compatible APIs.
//!
//! At startup the corpus matched by `documents_location_pattern` is read,
//! split into token-bounded chunks and embedded into an in-memory vector
//! store. Each question then flows through an ordered chain of advisors
//! before reaching the model:
//!
//! - [`advisor::memory`] primes the prompt with the recent conversation,
//! - [`advisor::retrieval`] finds matching chunks and wraps them around the question,
//! - [`advisor::documents`] shows what was retrieved,
//! - [`advisor::logger`] logs the final request.
//!
//! The answer streams back token by token through [`client::ResponseStream`]
//! into the [`repl::ChatLoop`].
//!
//! ## Modules
//! - Ingestion: [`reader`], [`splitter`], [`embedding`], [`vector_store`], [`ingest`]
//! - Conversation: [`memory`], [`advisor`], [`model`], [`client`], [`repl`]
//! - Plumbing: [`config`], [`commands`], [`document`], [`error`]

use directories::ProjectDirs;
use std::path::PathBuf;

pub mod advisor;
pub mod client;
pub mod commands;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod memory;
pub mod model;
pub mod reader;
pub mod repl;
pub mod splitter;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod test_support;

/// Return the per-platform configuration directory.
///
/// This uses [`directories::ProjectDirs`] with the application triple
/// `("com", "rag-chatbot", "ragbot")`, e.g. `~/.config/ragbot` on Linux.
/// The directory is **not** created by this function.
///
/// # Errors
/// Returns [`error::ChatbotError::Config`] if no home directory can be determined.
pub fn config_dir() -> error::Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "rag-chatbot", "ragbot").ok_or_else(|| {
        error::ChatbotError::Config("Unable to determine config directory".into())
    })?;
    Ok(proj_dirs.config_dir().to_path_buf())
}
