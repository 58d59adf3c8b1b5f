//! # VectorStore
//!
//! In-memory embedding store for the document corpus.
//!
//! Holds every chunk produced by ingestion next to its embedding and answers
//! similarity queries with an exact cosine scan. The corpus of a single
//! assistant is small enough that a linear pass per question is cheaper than
//! maintaining an approximate index.
//!
//! ## Responsibilities
//! - **Storage**: one entry per chunk; re-adding a chunk with the same id replaces it.
//! - **Search**: cosine similarity against every entry, thresholded, ranked, truncated.
//! - **Persistence**: [`VectorStore::save`] and [`VectorStore::load`] write a bincode
//!   snapshot tagged with a corpus fingerprint so unchanged corpora skip re-embedding.
//!
//! ## Quick Example
//! ```rust
//! use rag_chatbot::document::Document;
//! use rag_chatbot::vector_store::{SearchRequest, VectorStore};
//!
//! # fn main() -> rag_chatbot::error::Result<()> {
//! let mut store = VectorStore::new(2);
//! store.add(Document::new("Milton made landfall near Siesta Key."), vec![1.0, 0.0])?;
//! store.add(Document::new("Rust has a borrow checker."), vec![0.0, 1.0])?;
//!
//! let hits = store.similarity_search(&SearchRequest::new(vec![0.9, 0.1], 4, 0.5))?;
//! assert_eq!(hits.len(), 1);
//! assert!(hits[0].score.unwrap() > 0.9);
//! # Ok(()) }
//! ```

use std::{cmp::Ordering, collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::{
    document::Document,
    error::{ChatbotError, Result},
};

/// Parameters of one similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query_embedding: Vec<f32>,
    /// Maximum number of documents returned.
    pub top_k: usize,
    /// Minimum cosine similarity, inclusive.
    pub similarity_threshold: f32,
}

impl SearchRequest {
    pub fn new(query_embedding: Vec<f32>, top_k: usize, similarity_threshold: f32) -> Self {
        Self {
            query_embedding,
            top_k,
            similarity_threshold,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    document: Document,
    embedding: Vec<f32>,
}

/// Chunk embeddings plus the documents they were computed from.
#[derive(Debug, Clone)]
pub struct VectorStore {
    dimension: usize,
    entries: Vec<Entry>,
}

/// On-disk layout written by [`VectorStore::save`].
///
/// Metadata travels as a JSON string because bincode cannot drive
/// `serde_json::Value`'s self-describing deserializer.
#[derive(Serialize, Deserialize)]
struct StoreSnapshot {
    fingerprint: String,
    dimension: usize,
    entries: Vec<SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    id: String,
    text: String,
    metadata_json: String,
    embedding: Vec<f32>,
}

impl VectorStore {
    /// Create an empty store accepting vectors of length `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store a document with its embedding, replacing any entry with the same id.
    ///
    /// # Errors
    /// [`ChatbotError::DimensionMismatch`] if `embedding.len() != self.dimension()`.
    pub fn add(&mut self, document: Document, embedding: Vec<f32>) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(ChatbotError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        match self.entries.iter_mut().find(|e| e.document.id == document.id) {
            Some(existing) => {
                existing.document = document;
                existing.embedding = embedding;
            }
            None => self.entries.push(Entry {
                document,
                embedding,
            }),
        }
        Ok(())
    }

    /// Store documents paired one-to-one with embeddings.
    pub fn add_all(&mut self, documents: Vec<Document>, embeddings: Vec<Vec<f32>>) -> Result<()> {
        if documents.len() != embeddings.len() {
            return Err(ChatbotError::Embedding(format!(
                "{} documents but {} embeddings",
                documents.len(),
                embeddings.len()
            )));
        }
        for (document, embedding) in documents.into_iter().zip(embeddings) {
            self.add(document, embedding)?;
        }
        Ok(())
    }

    /// Documents whose cosine similarity to the query is at least the threshold,
    /// best first, at most `top_k` of them.
    ///
    /// Each returned document is a copy carrying `score` and `distance` metadata.
    pub fn similarity_search(&self, request: &SearchRequest) -> Result<Vec<Document>> {
        if request.query_embedding.len() != self.dimension {
            return Err(ChatbotError::DimensionMismatch {
                expected: self.dimension,
                actual: request.query_embedding.len(),
            });
        }

        let mut scored: Vec<(f32, &Document)> = self
            .entries
            .iter()
            .map(|e| (cosine_similarity(&request.query_embedding, &e.embedding), &e.document))
            .filter(|(score, _)| *score >= request.similarity_threshold)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.truncate(request.top_k);

        debug!(
            "Similarity search kept {} of {} entries (threshold {:.2})",
            scored.len(),
            self.entries.len(),
            request.similarity_threshold
        );

        Ok(scored
            .into_iter()
            .map(|(score, doc)| doc.with_score(score))
            .collect())
    }

    /// Write the store to `path` tagged with `fingerprint`.
    pub fn save(&self, path: &Path, fingerprint: &str) -> Result<()> {
        let entries = self
            .entries
            .iter()
            .map(|e| {
                Ok(SnapshotEntry {
                    id: e.document.id.clone(),
                    text: e.document.text.clone(),
                    metadata_json: serde_json::to_string(&e.document.metadata)
                        .map_err(|err| ChatbotError::Snapshot(err.to_string()))?,
                    embedding: e.embedding.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let snapshot = StoreSnapshot {
            fingerprint: fingerprint.to_string(),
            dimension: self.dimension,
            entries,
        };
        let bytes = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())
            .map_err(|e| ChatbotError::Snapshot(e.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        info!("Saved {} vector(s) to {}", self.len(), path.display());
        Ok(())
    }

    /// Read a store from `path`, returning it together with its fingerprint.
    pub fn load(path: &Path) -> Result<(Self, String)> {
        let bytes = fs::read(path)?;
        let (snapshot, _): (StoreSnapshot, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| ChatbotError::Snapshot(e.to_string()))?;

        let mut store = Self::new(snapshot.dimension);
        for entry in snapshot.entries {
            let metadata: BTreeMap<String, JsonValue> = serde_json::from_str(&entry.metadata_json)
                .map_err(|e| ChatbotError::Snapshot(e.to_string()))?;
            let document = Document {
                id: entry.id,
                text: entry.text,
                score: None,
                metadata,
            };
            store.add(document, entry.embedding)?;
        }

        debug!("Loaded {} vector(s) from {}", store.len(), path.display());
        Ok((store, snapshot.fingerprint))
    }

    /// Load `path` only if it exists, matches `fingerprint` and `dimension`.
    ///
    /// Unreadable or stale snapshots are logged and treated as absent.
    pub fn load_if_fresh(path: &Path, fingerprint: &str, dimension: usize) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match Self::load(path) {
            Ok((store, saved)) if saved == fingerprint && store.dimension == dimension => {
                Some(store)
            }
            Ok(_) => {
                info!("Snapshot {} is stale, re-indexing", path.display());
                None
            }
            Err(e) => {
                warn!("Ignoring unreadable snapshot {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Cosine similarity of two equal-length vectors; 0 when either is all zeros.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{self, DISTANCE};
    use tempfile::tempdir;

    /// Unit vector at cosine `c` from `[1, 0]`.
    fn at_cosine(c: f32) -> Vec<f32> {
        vec![c, (1.0 - c * c).sqrt()]
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn storm_store() -> VectorStore {
        let mut store = VectorStore::new(2);
        store
            .add(Document::new("Milton peaked at Category 5."), at_cosine(0.91))
            .unwrap();
        store
            .add(Document::new("Evacuation orders covered Tampa."), at_cosine(0.55))
            .unwrap();
        store
            .add(Document::new("Citrus harvest outlook."), at_cosine(0.40))
            .unwrap();
        store
    }

    #[test]
    fn test_threshold_and_ranking() {
        let store = storm_store();
        let hits = store
            .similarity_search(&SearchRequest::new(vec![1.0, 0.0], 4, 0.5))
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "Milton peaked at Category 5.");
        assert_eq!(hits[1].text, "Evacuation orders covered Tampa.");
        assert!(approx(hits[0].score.unwrap(), 0.91));
        assert!(approx(hits[1].score.unwrap(), 0.55));
        let distance = hits[0].metadata.get(DISTANCE).and_then(|v| v.as_f64()).unwrap();
        assert!((distance - 0.09).abs() < 1e-4);
    }

    #[test]
    fn test_no_result_below_threshold() {
        let store = storm_store();
        let hits = store
            .similarity_search(&SearchRequest::new(vec![1.0, 0.0], 4, 0.95))
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut store = VectorStore::new(2);
        store.add(Document::new("exact"), vec![1.0, 0.0]).unwrap();
        let hits = store
            .similarity_search(&SearchRequest::new(vec![1.0, 0.0], 4, 1.0))
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_top_k_truncates() {
        let store = storm_store();
        let hits = store
            .similarity_search(&SearchRequest::new(vec![1.0, 0.0], 1, 0.0))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(approx(hits[0].score.unwrap(), 0.91));
    }

    #[test]
    fn test_dimension_checks() {
        let mut store = VectorStore::new(3);
        assert!(matches!(
            store.add(Document::new("short"), vec![1.0, 0.0]),
            Err(ChatbotError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(store
            .similarity_search(&SearchRequest::new(vec![1.0], 4, 0.5))
            .is_err());
    }

    #[test]
    fn test_same_id_replaces_entry() {
        let mut store = VectorStore::new(2);
        store.add(Document::new("same"), vec![1.0, 0.0]).unwrap();
        store.add(Document::new("same"), vec![0.0, 1.0]).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_snapshot_round_trip_and_freshness() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index").join("store.bin");

        let mut store = VectorStore::new(2);
        let doc = Document::new("Surge reached 10 feet.")
            .with_metadata(document::SOURCE, "milton.pdf")
            .with_metadata(document::PAGE_NUMBER, 2);
        store.add(doc.clone(), vec![0.6, 0.8]).unwrap();
        store.save(&path, "abc").unwrap();

        let (loaded, fingerprint) = VectorStore::load(&path).unwrap();
        assert_eq!(fingerprint, "abc");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.entries[0].document, doc);
        assert_eq!(loaded.entries[0].embedding, vec![0.6, 0.8]);

        assert!(VectorStore::load_if_fresh(&path, "abc", 2).is_some());
        assert!(VectorStore::load_if_fresh(&path, "changed", 2).is_none());
        assert!(VectorStore::load_if_fresh(&path, "abc", 384).is_none());
        assert!(VectorStore::load_if_fresh(&dir.path().join("missing.bin"), "abc", 2).is_none());
    }
}
