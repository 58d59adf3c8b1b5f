//! This module defines the command-line interface for the application using `clap`.
//!
//! [`Cli`] carries the global options, which override the matching fields of
//! the YAML configuration, and an optional [`Commands`] subcommand. Running
//! `ragbot` without a subcommand is the same as `ragbot chat`.
//!
//! # Examples
//!
//! ```no_run
//! use clap::Parser;
//! use rag_chatbot::commands::{Cli, Commands};
//!
//! let cli = Cli::parse();
//! match cli.command.unwrap_or_default() {
//!     Commands::Chat => { /* ingest, then chat */ }
//!     Commands::Ingest => { /* ingest only */ }
//!     Commands::Init => { /* write a default config */ }
//! }
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{ChatbotConfig, DocumentLogMode};

/// Represents the parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// Path to the YAML config. Defaults to `config.yaml` in the config directory.
    #[arg(long, short = 'c', env = "RAGBOT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Glob resolving to the corpus files.
    #[arg(long, short = 'd', global = true)]
    pub documents: Option<String>,

    /// Minimum cosine similarity for a chunk to be used (0.0 - 1.0).
    #[arg(long, global = true)]
    pub threshold: Option<f32>,

    /// How many conversation turns the chat memory keeps.
    #[arg(long, global = true)]
    pub window_size: Option<usize>,

    /// Where to show the documents retrieved for each question.
    #[arg(long, value_enum, global = true)]
    pub document_log: Option<DocumentLogMode>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Represents the available subcommands.
#[derive(Subcommand, Debug, Default, PartialEq, Eq, Clone, Copy)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// Index the documents, then start an interactive chat.
    #[default]
    #[clap(name = "chat")]
    Chat,

    /// Index the documents and report how many chunks were stored.
    #[clap(name = "ingest")]
    Ingest,

    /// Write a default configuration file into the config directory.
    Init,
}

impl Cli {
    /// Apply the command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut ChatbotConfig) {
        if let Some(documents) = &self.documents {
            config.documents_location_pattern = documents.clone();
        }
        if let Some(threshold) = self.threshold {
            config.similarity_threshold = threshold;
        }
        if let Some(window_size) = self.window_size {
            config.window_size = window_size;
        }
        if let Some(document_log) = self.document_log {
            config.document_log = document_log;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_chat() {
        let cli = Cli::try_parse_from(["ragbot"]).unwrap();
        assert_eq!(cli.command.unwrap_or_default(), Commands::Chat);
        assert!(cli.threshold.is_none());
    }

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::try_parse_from([
            "ragbot",
            "ingest",
            "--documents",
            "corpus/*.md",
            "--threshold",
            "0.7",
            "--window-size",
            "4",
            "--document-log",
            "off",
        ])
        .unwrap();
        assert_eq!(cli.command, Some(Commands::Ingest));

        let mut config = ChatbotConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.documents_location_pattern, "corpus/*.md");
        assert_eq!(config.similarity_threshold, 0.7);
        assert_eq!(config.window_size, 4);
        assert_eq!(config.document_log, DocumentLogMode::Off);
    }

    #[test]
    fn test_rejects_unknown_document_log() {
        assert!(Cli::try_parse_from(["ragbot", "--document-log", "printer"]).is_err());
    }
}
