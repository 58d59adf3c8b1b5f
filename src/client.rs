//! # Chat client
//!
//! Glues the advisor chain to the chat model.
//!
//! [`ChatClient::stream`] runs every `before` hook, opens the model stream and
//! returns a [`ResponseStream`]. The caller pulls fragments with
//! [`ResponseStream::next_fragment`] and, once the stream is exhausted, calls
//! [`ResponseStream::finish`] so the `after` hooks (chat memory among them)
//! see the complete answer. Dropping a `ResponseStream` without finishing it
//! discards the answer.
//!
//! [`ChatClient::from_config`] assembles the advisors in their fixed order:
//! chat memory, retrieval, the retrieved documents report (unless turned off)
//! and the request logger.

use std::sync::Arc;

use futures::StreamExt;

use crate::{
    advisor::{
        AdvisorChain, ChatRequest,
        documents::{DocumentSink, RetrievedDocumentsAdvisor, SharedWriter},
        logger::RequestLogAdvisor,
        memory::ChatMemoryAdvisor,
        retrieval::RetrievalAdvisor,
    },
    config::{ChatbotConfig, DocumentLogMode},
    embedding::Embedder,
    error::Result,
    memory::MessageWindowMemory,
    model::{ChatModel, Prompt, TokenStream},
    vector_store::VectorStore,
};

pub struct ChatClient {
    system_prompt: String,
    chain: AdvisorChain,
    model: Arc<dyn ChatModel>,
}

impl ChatClient {
    pub fn new(system_prompt: impl Into<String>, chain: AdvisorChain, model: Arc<dyn ChatModel>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            chain,
            model,
        }
    }

    /// Client with the full advisor chain for `config`. The search results
    /// block goes to `console` when `document_log` is `console`.
    pub fn from_config(
        config: &ChatbotConfig,
        embedder: Arc<dyn Embedder>,
        store: Arc<VectorStore>,
        model: Arc<dyn ChatModel>,
        console: SharedWriter,
    ) -> Self {
        let memory = Arc::new(tokio::sync::Mutex::new(MessageWindowMemory::new(
            config.window_size,
        )));

        let mut chain = AdvisorChain::new()
            .with(ChatMemoryAdvisor::new(memory))
            .with(RetrievalAdvisor::new(
                embedder,
                store,
                config.top_k,
                config.similarity_threshold,
            ));

        let sink = match config.document_log {
            DocumentLogMode::Console => Some(DocumentSink::Console(console)),
            DocumentLogMode::Log => Some(DocumentSink::Log),
            DocumentLogMode::Off => None,
        };
        if let Some(sink) = sink {
            chain.push(Box::new(RetrievedDocumentsAdvisor::new(sink)));
        }
        chain.push(Box::new(RequestLogAdvisor));

        Self::new(config.system_prompt.clone(), chain, model)
    }

    pub fn advisor_names(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    /// Advise the request for `user_text` and open the model stream.
    pub async fn stream(&self, user_text: &str) -> Result<ResponseStream<'_>> {
        let mut request = ChatRequest::new(self.system_prompt.clone(), user_text);
        self.chain.before(&mut request).await?;

        let tokens = self.model.stream(Prompt::from_request(&request)).await?;
        Ok(ResponseStream {
            chain: &self.chain,
            request,
            tokens,
            text: String::new(),
        })
    }

    /// Stream and collect the whole answer.
    pub async fn call(&self, user_text: &str) -> Result<String> {
        let mut response = self.stream(user_text).await?;
        while let Some(fragment) = response.next_fragment().await {
            fragment?;
        }
        response.finish().await
    }
}

/// An answer being received.
pub struct ResponseStream<'a> {
    chain: &'a AdvisorChain,
    request: ChatRequest,
    tokens: TokenStream,
    text: String,
}

impl ResponseStream<'_> {
    /// Next fragment, or `None` once the model is done.
    pub async fn next_fragment(&mut self) -> Option<Result<String>> {
        let item = self.tokens.next().await;
        if let Some(Ok(fragment)) = &item {
            self.text.push_str(fragment);
        }
        item
    }

    /// The request as the advisors left it.
    pub fn request(&self) -> &ChatRequest {
        &self.request
    }

    /// Run the `after` hooks with the full answer and return it.
    pub async fn finish(self) -> Result<String> {
        self.chain.after(&self.request, &self.text).await?;
        Ok(self.text)
    }
}
