//! # Documents
//!
//! The unit of text that moves through ingestion, the vector store and the
//! advisor chain. A [`Document`] is created by the reader, split into child
//! documents by the splitter, stored with its embedding, and handed back by
//! similarity search carrying a `score`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Metadata key for the path the document was read from.
pub const SOURCE: &str = "source";
/// Metadata key for the bare file name of the source.
pub const FILE_NAME: &str = "file_name";
/// Metadata key for the 1-based PDF page a document came from.
pub const PAGE_NUMBER: &str = "page_number";
/// Metadata key for the position of a chunk within its parent.
pub const CHUNK_INDEX: &str = "chunk_index";
/// Metadata key linking a chunk back to the document it was split from.
pub const PARENT_DOCUMENT_ID: &str = "parent_document_id";
/// Metadata key for `1 - score`, set on retrieval.
pub const DISTANCE: &str = "distance";

/// A piece of text plus where it came from and, after retrieval, how well it matched.
///
/// # Examples
/// ```rust
/// use rag_chatbot::document::Document;
///
/// let doc = Document::new("Milton made landfall near Siesta Key.")
///     .with_metadata("source", "milton.pdf");
/// assert!(doc.score.is_none());
///
/// let scored = doc.with_score(0.91);
/// assert_eq!(scored.score, Some(0.91));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Deterministic id derived from the text and its metadata.
    pub id: String,
    /// The full text body.
    pub text: String,
    /// Cosine similarity to the query; only present on search results.
    pub score: Option<f32>,
    /// Free-form metadata (source path, page, chunk index, ...).
    pub metadata: BTreeMap<String, JsonValue>,
}

impl Document {
    /// Build a document with no metadata. The id is a blake3 digest of the text.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let id = content_id(&text, &BTreeMap::new());
        Self {
            id,
            text,
            score: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Build a document with metadata. The id covers both text and metadata so
    /// identical text from two sources gets two ids.
    pub fn with_metadata_map(text: impl Into<String>, metadata: BTreeMap<String, JsonValue>) -> Self {
        let text = text.into();
        let id = content_id(&text, &metadata);
        Self {
            id,
            text,
            score: None,
            metadata,
        }
    }

    /// Add one metadata entry, recomputing the id.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self.id = content_id(&self.text, &self.metadata);
        self
    }

    /// Copy of this document carrying a similarity score. The id is unchanged.
    pub fn with_score(&self, score: f32) -> Self {
        let mut scored = self.clone();
        scored.score = Some(score);
        scored
            .metadata
            .insert(DISTANCE.to_string(), JsonValue::from(1.0 - score));
        scored
    }

    /// Convenience accessor for string metadata.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(JsonValue::as_str)
    }
}

fn content_id(text: &str, metadata: &BTreeMap<String, JsonValue>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(text.as_bytes());
    for (key, value) in metadata {
        if key == DISTANCE {
            continue;
        }
        hasher.update(key.as_bytes());
        hasher.update(value.to_string().as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_deterministic() {
        let a = Document::new("same text").with_metadata(SOURCE, "a.txt");
        let b = Document::new("same text").with_metadata(SOURCE, "a.txt");
        let c = Document::new("same text").with_metadata(SOURCE, "b.txt");
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_with_score_keeps_id_and_sets_distance() {
        let doc = Document::new("storm surge").with_metadata(PAGE_NUMBER, 3);
        let scored = doc.with_score(0.75);
        assert_eq!(scored.id, doc.id);
        assert_eq!(scored.score, Some(0.75));
        assert_eq!(
            scored.metadata.get(DISTANCE).and_then(JsonValue::as_f64),
            Some(0.25)
        );
        assert!(doc.score.is_none(), "original must stay untouched");
    }
}
