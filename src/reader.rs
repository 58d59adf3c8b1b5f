//! # Document reader
//!
//! Turns the configured documents location pattern into [`Document`]s.
//!
//! - [`resolve_pattern`] expands a glob (`docs/*.pdf`, `corpus/**/*.md`) into a
//!   sorted list of files.
//! - [`read_document`] reads one file: PDFs become one document per non-blank
//!   page, any other file is read as UTF-8 text into a single document.
//!
//! Every document carries `source` and `file_name` metadata; PDF pages also
//! carry a 1-based `page_number`.

use std::{
    fs,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::{
    document::{self, Document},
    error::{ChatbotError, Result},
};

/// Expand `pattern` into the files it matches, sorted for a stable ingestion order.
///
/// Directories are skipped. A pattern that matches no file is an error, since
/// the assistant has nothing to answer from.
pub fn resolve_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob::glob(pattern).map_err(|source| ChatbotError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ChatbotError::Io(e.into_error()))?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    if paths.is_empty() {
        return Err(ChatbotError::NoDocuments(pattern.to_string()));
    }

    info!("Resolved {} document(s) from {}", paths.len(), pattern);
    Ok(paths)
}

/// Read every file matched by `pattern`.
pub fn read_documents(pattern: &str) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for path in resolve_pattern(pattern)? {
        documents.extend(read_document(&path)?);
    }
    Ok(documents)
}

/// Read one file into documents, dispatching on the extension.
pub fn read_document(path: &Path) -> Result<Vec<Document>> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        read_pdf(path)
    } else {
        read_text(path)
    }
}

fn read_pdf(path: &Path) -> Result<Vec<Document>> {
    let pdf_error = |message: String| ChatbotError::Pdf {
        path: path.display().to_string(),
        message,
    };

    // pdf-extract panics on some malformed files
    let pages = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_by_pages(path)))
        .map_err(|_| pdf_error("the PDF parser panicked".to_string()))?
        .map_err(|e| pdf_error(e.to_string()))?;

    let documents: Vec<Document> = pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(index, text)| {
            base_document(text, path).with_metadata(document::PAGE_NUMBER, index + 1)
        })
        .collect();

    debug!("Read {} page(s) from {}", documents.len(), path.display());
    Ok(documents)
}

fn read_text(path: &Path) -> Result<Vec<Document>> {
    let text = fs::read_to_string(path).map_err(|source| ChatbotError::Read {
        path: path.display().to_string(),
        source,
    })?;
    if text.trim().is_empty() {
        debug!("Skipping empty file {}", path.display());
        return Ok(Vec::new());
    }
    Ok(vec![base_document(text, path)])
}

fn base_document(text: String, path: &Path) -> Document {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Document::new(text)
        .with_metadata(document::SOURCE, path.display().to_string())
        .with_metadata(document::FILE_NAME, file_name)
}
