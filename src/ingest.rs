//! # Ingestion
//!
//! Builds the vector store the assistant answers from:
//!
//! 1. resolve the documents location pattern,
//! 2. read every file into documents,
//! 3. split them into token-bounded chunks (in parallel),
//! 4. embed the chunks in batches, with a progress bar on stderr,
//! 5. insert them into a [`VectorStore`].
//!
//! When `vector_store_path` is configured the finished store is saved there
//! together with a fingerprint of the corpus and the settings that shaped it.
//! The next start reuses the snapshot if the fingerprint still matches.

use std::{fs, path::PathBuf, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::{
    config::ChatbotConfig,
    document::Document,
    embedding::Embedder,
    error::{ChatbotError, Result},
    reader,
    splitter::TokenTextSplitter,
    vector_store::VectorStore,
};

/// Chunks sent to the embedder per request.
pub const EMBED_BATCH_SIZE: usize = 32;

/// What an ingestion run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub files: usize,
    pub documents: usize,
    pub chunks: usize,
    /// The store came from a matching snapshot instead of being rebuilt.
    pub reused_snapshot: bool,
}

/// Run the full pipeline for `config`, embedding with `embedder`.
pub async fn ingest(config: &ChatbotConfig, embedder: &dyn Embedder) -> Result<(VectorStore, IngestReport)> {
    let paths = reader::resolve_pattern(&config.documents_location_pattern)?;
    let fingerprint = corpus_fingerprint(&paths, config)?;

    if let Some(snapshot_path) = &config.vector_store_path {
        if let Some(store) = VectorStore::load_if_fresh(snapshot_path, &fingerprint, embedder.dimension()) {
            info!("Reusing vector store snapshot {}", snapshot_path.display());
            let report = IngestReport {
                files: paths.len(),
                documents: 0,
                chunks: store.len(),
                reused_snapshot: true,
            };
            return Ok((store, report));
        }
    }

    let mut documents = Vec::new();
    for path in &paths {
        documents.extend(reader::read_document(path)?);
    }
    info!("Read {} document(s) from {} file(s)", documents.len(), paths.len());

    let splitter = TokenTextSplitter::new(config.splitter.clone());
    let chunks = splitter.split_all(&documents);
    info!("Split into {} chunk(s)", chunks.len());

    let store = embed_chunks(chunks, embedder).await?;

    if let Some(snapshot_path) = &config.vector_store_path {
        store.save(snapshot_path, &fingerprint)?;
    }

    let report = IngestReport {
        files: paths.len(),
        documents: documents.len(),
        chunks: store.len(),
        reused_snapshot: false,
    };
    Ok((store, report))
}

/// Embed `chunks` in batches and collect them into a store.
pub async fn embed_chunks(chunks: Vec<Document>, embedder: &dyn Embedder) -> Result<VectorStore> {
    let mut store = VectorStore::new(embedder.dimension());

    let progress = ProgressBar::new(chunks.len() as u64);
    let style = ProgressStyle::with_template("{spinner} Embedding [{bar:40}] {pos}/{len} chunks")
        .map_err(|e| ChatbotError::Config(e.to_string()))?
        .progress_chars("=> ");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(120));

    for batch in chunks.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        debug!("Embedded batch of {}", batch.len());
        store.add_all(batch.to_vec(), vectors)?;
        progress.inc(batch.len() as u64);
    }

    progress.finish_and_clear();
    Ok(store)
}

/// Digest of the corpus files plus every setting that changes the resulting vectors.
pub fn corpus_fingerprint(paths: &[PathBuf], config: &ChatbotConfig) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    for path in paths {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(&fs::read(path)?);
    }

    let settings = serde_json::to_vec(&(&config.splitter, &config.embedding))
        .map_err(|e| ChatbotError::Snapshot(e.to_string()))?;
    hasher.update(&settings);

    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        document,
        test_support::KeywordEmbedder,
        vector_store::SearchRequest,
    };
    use tempfile::tempdir;

    fn config_for(dir: &std::path::Path) -> ChatbotConfig {
        ChatbotConfig {
            documents_location_pattern: format!("{}/*.txt", dir.display()),
            ..ChatbotConfig::default()
        }
    }

    #[tokio::test]
    async fn test_ingest_builds_searchable_store() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("milton.txt"), "Hurricane Milton storm surge flooded Tampa.").unwrap();
        fs::write(dir.path().join("bread.txt"), "Baking bread needs patience and flour.").unwrap();

        let embedder = KeywordEmbedder;
        let (store, report) = ingest(&config_for(dir.path()), &embedder).await.unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(report.documents, 2);
        assert_eq!(report.chunks, 2);
        assert!(!report.reused_snapshot);

        let query = embedder.vector_for("hurricane surge");
        let hits = store.similarity_search(&SearchRequest::new(query, 4, 0.5)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata_str(document::FILE_NAME), Some("milton.txt"));
        assert_eq!(hits[0].metadata.get(document::CHUNK_INDEX).and_then(|v| v.as_u64()), Some(0));
    }

    #[tokio::test]
    async fn test_ingest_without_documents_fails() {
        let dir = tempdir().unwrap();
        let result = ingest(&config_for(dir.path()), &KeywordEmbedder).await;
        assert!(matches!(result, Err(ChatbotError::NoDocuments(_))));
    }

    #[tokio::test]
    async fn test_snapshot_is_reused_until_corpus_changes() {
        let dir = tempdir().unwrap();
        let corpus = dir.path().join("corpus");
        fs::create_dir(&corpus).unwrap();
        fs::write(corpus.join("milton.txt"), "Milton made landfall near Siesta Key in Florida.").unwrap();

        let config = ChatbotConfig {
            vector_store_path: Some(dir.path().join("store.bin")),
            ..config_for(&corpus)
        };

        let (_, first) = ingest(&config, &KeywordEmbedder).await.unwrap();
        assert!(!first.reused_snapshot);

        let (store, second) = ingest(&config, &KeywordEmbedder).await.unwrap();
        assert!(second.reused_snapshot);
        assert_eq!(store.len(), 1);

        fs::write(corpus.join("tampa.txt"), "Tampa Bay avoided the worst storm surge.").unwrap();
        let (store, third) = ingest(&config, &KeywordEmbedder).await.unwrap();
        assert!(!third.reused_snapshot);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_fingerprint_tracks_splitter_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "content").unwrap();
        let paths = vec![path];

        let config = ChatbotConfig::default();
        let mut resized = ChatbotConfig::default();
        resized.splitter.chunk_size = 256;

        assert_eq!(
            corpus_fingerprint(&paths, &config).unwrap(),
            corpus_fingerprint(&paths, &config).unwrap()
        );
        assert_ne!(
            corpus_fingerprint(&paths, &config).unwrap(),
            corpus_fingerprint(&paths, &resized).unwrap()
        );
    }
}
