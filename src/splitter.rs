//! # Token text splitter
//!
//! Splits documents into token-bounded chunks for embedding, counting tokens
//! with the `cl100k_base` BPE from `tiktoken_rs`.
//!
//! Each step takes up to `chunk_size` tokens from the front of the remaining
//! text, then, if a `.`, `?`, `!` or newline appears past
//! `min_chunk_size_chars`, cuts right after the last one so chunks tend to end
//! on sentence boundaries. Chunks no longer than `min_chunk_length_to_embed`
//! characters are dropped; whitespace-only stretches are skipped. Text left
//! over once `max_num_chunks` chunks were taken is dropped with a warning, so
//! no chunk ever exceeds `chunk_size` tokens.
//!
//! The splitter works on byte offsets of the original text rather than on
//! decoded token slices, so a chunk edge never lands inside a multi-byte
//! character and no text is lost between chunks.
//!
//! ```rust
//! use rag_chatbot::config::SplitterConfig;
//! use rag_chatbot::splitter::TokenTextSplitter;
//!
//! let splitter = TokenTextSplitter::new(SplitterConfig {
//!     chunk_size: 16,
//!     min_chunk_size_chars: 10,
//!     ..SplitterConfig::default()
//! });
//! let chunks = splitter.split_text("Milton formed in the Gulf. It intensified quickly. \
//!     It reached Category 5 within a day.");
//! assert!(chunks.len() >= 2);
//! ```

use rayon::prelude::*;
use tiktoken_rs::{CoreBPE, cl100k_base_singleton};
use tracing::{debug, warn};

use crate::{
    config::SplitterConfig,
    document::{self, Document},
};

/// Characters a chunk prefers to end on.
const BOUNDARIES: [char; 4] = ['.', '?', '!', '\n'];

/// Splits text into chunks of at most `chunk_size` tokens.
pub struct TokenTextSplitter {
    config: SplitterConfig,
    bpe: &'static CoreBPE,
}

impl Default for TokenTextSplitter {
    fn default() -> Self {
        Self::new(SplitterConfig::default())
    }
}

impl TokenTextSplitter {
    pub fn new(config: SplitterConfig) -> Self {
        Self {
            config,
            bpe: cl100k_base_singleton(),
        }
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Number of `cl100k_base` tokens in `text`.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Split raw text into chunk strings, in order.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut rest = text;
        let mut num_chunks = 0;

        while !rest.is_empty() && num_chunks < self.config.max_num_chunks {
            let end = self.token_window_end(rest);
            let candidate = &rest[..end];

            if candidate.trim().is_empty() {
                rest = &rest[end..];
                continue;
            }

            let cut = self.sentence_cut(candidate);
            let chunk_text = &candidate[..cut];
            let to_append = if self.config.keep_separator {
                chunk_text.trim().to_string()
            } else {
                chunk_text.replace('\n', " ").trim().to_string()
            };

            if to_append.chars().count() > self.config.min_chunk_length_to_embed {
                chunks.push(to_append);
            }

            rest = &rest[cut..];
            num_chunks += 1;
        }

        if !rest.trim().is_empty() {
            warn!(
                "Reached max_num_chunks ({}); dropping the last {} byte(s) of the text",
                self.config.max_num_chunks,
                rest.len()
            );
        }

        chunks
    }

    /// Split one document into child documents that inherit its metadata.
    pub fn split(&self, parent: &Document) -> Vec<Document> {
        let chunks = self.split_text(&parent.text);
        debug!(
            "Split document {} into {} chunk(s)",
            &parent.id[..12.min(parent.id.len())],
            chunks.len()
        );

        chunks
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                Document::with_metadata_map(text, parent.metadata.clone())
                    .with_metadata(document::CHUNK_INDEX, index)
                    .with_metadata(document::PARENT_DOCUMENT_ID, parent.id.clone())
            })
            .collect()
    }

    /// Split many documents in parallel, keeping the input order.
    pub fn split_all(&self, documents: &[Document]) -> Vec<Document> {
        documents
            .par_iter()
            .map(|doc| self.split(doc))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    /// Byte offset in `rest` covering at most `chunk_size` tokens, on a char boundary.
    fn token_window_end(&self, rest: &str) -> usize {
        let chunk_size = self.config.chunk_size.max(1);

        // Tokenise a growing prefix instead of the whole remainder.
        let mut window = chunk_size.saturating_mul(8).max(64);
        let tokens = loop {
            let end = floor_char_boundary(rest, window.min(rest.len()));
            let tokens = self.bpe.encode_ordinary(&rest[..end]);
            if tokens.len() > chunk_size || end == rest.len() {
                break tokens;
            }
            window = window.saturating_mul(2);
        };

        let take = tokens.len().min(chunk_size);
        let bytes: usize = self
            .bpe
            ._decode_native_and_split(tokens[..take].to_vec())
            .map(|piece| piece.len())
            .sum();

        let end = floor_char_boundary(rest, bytes.min(rest.len()));
        if end == 0 {
            ceil_char_boundary(rest, 1)
        } else {
            end
        }
    }

    /// Where to cut `candidate`: just after the last boundary char past the minimum size.
    fn sentence_cut(&self, candidate: &str) -> usize {
        match candidate.rfind(BOUNDARIES) {
            Some(pos) if candidate[..pos].chars().count() > self.config.min_chunk_size_chars => {
                pos + 1
            }
            _ => candidate.len(),
        }
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index.min(s.len())
}
