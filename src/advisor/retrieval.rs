//! Retrieval-augmented generation: finds the chunks closest to the question
//! and folds them into the user message.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Advisor, ChatRequest, ContextValue, RETRIEVED_DOCUMENTS};
use crate::{
    document::Document,
    embedding::Embedder,
    error::Result,
    vector_store::{SearchRequest, VectorStore},
};

/// Template wrapped around the question when context was found.
pub const CONTEXT_TEMPLATE: &str = "Context information is below.

---------------------
{context}
---------------------

Given the context information and no prior knowledge, answer the query.

Follow these rules:

1. If the answer is not in the context, just say that you don't know.
2. Avoid statements like \"Based on the context...\" or \"The provided information...\".

Query: {query}

Answer:
";

pub struct RetrievalAdvisor {
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
    top_k: usize,
    similarity_threshold: f32,
}

impl RetrievalAdvisor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<VectorStore>,
        top_k: usize,
        similarity_threshold: f32,
    ) -> Self {
        Self {
            embedder,
            store,
            top_k,
            similarity_threshold,
        }
    }
}

/// Fill [`CONTEXT_TEMPLATE`] with the document texts and the question.
pub fn augment(query: &str, documents: &[Document]) -> String {
    let context = documents
        .iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    CONTEXT_TEMPLATE
        .replace("{context}", &context)
        .replace("{query}", query)
}

#[async_trait]
impl Advisor for RetrievalAdvisor {
    fn name(&self) -> &'static str {
        "RetrievalAdvisor"
    }

    async fn before(&self, request: &mut ChatRequest) -> Result<()> {
        let query_embedding = self.embedder.embed(&request.user_text).await?;
        let documents = self.store.similarity_search(&SearchRequest::new(
            query_embedding,
            self.top_k,
            self.similarity_threshold,
        ))?;

        debug!("Retrieved {} document(s) for the question", documents.len());
        if !documents.is_empty() {
            request.user_message = augment(&request.user_text, &documents);
        }
        request
            .context
            .insert(RETRIEVED_DOCUMENTS, ContextValue::Documents(documents));
        Ok(())
    }
}
