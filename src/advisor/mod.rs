//! # Advisors
//!
//! Request/response interceptors wrapped around every model call.
//!
//! An [`Advisor`] gets one `before` hook, which may enrich the outgoing
//! [`ChatRequest`], and one `after` hook, which sees the finished response
//! text. The [`AdvisorChain`] runs `before` hooks in registration order and
//! `after` hooks in reverse, so the first advisor registered is the outermost
//! one. The model call itself always happens after the last `before` hook.
//!
//! Advisors share per-request state through [`AdviseContext`]; the retrieval
//! advisor publishes its ranked documents under [`RETRIEVED_DOCUMENTS`] for
//! the document-logging advisor to pick up.

pub mod documents;
pub mod logger;
pub mod memory;
pub mod retrieval;

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::trace;

use crate::{document::Document, error::Result, memory::Turn};

/// Context key holding the documents retrieved for the current request.
pub const RETRIEVED_DOCUMENTS: &str = "retrieved_documents";

/// A value advisors can leave for each other.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Documents(Vec<Document>),
    Text(String),
}

/// Per-request key/value map shared along the chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdviseContext {
    values: HashMap<String, ContextValue>,
}

impl AdviseContext {
    pub fn insert(&mut self, key: impl Into<String>, value: ContextValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    /// Documents stored under `key`, if that entry holds documents.
    pub fn documents(&self, key: &str) -> Option<&[Document]> {
        match self.values.get(key) {
            Some(ContextValue::Documents(docs)) => Some(docs),
            _ => None,
        }
    }

    /// Text stored under `key`, if that entry holds text.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ContextValue::Text(text)) => Some(text),
            _ => None,
        }
    }
}

/// One model call in the making.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system_prompt: String,
    /// Prior turns, oldest first, placed between the system prompt and the user message.
    pub history: Vec<Turn>,
    /// The question exactly as the user typed it.
    pub user_text: String,
    /// The user message sent to the model; advisors may rewrite it.
    pub user_message: String,
    pub context: AdviseContext,
}

impl ChatRequest {
    pub fn new(system_prompt: impl Into<String>, user_text: impl Into<String>) -> Self {
        let user_text = user_text.into();
        Self {
            system_prompt: system_prompt.into(),
            history: Vec::new(),
            user_message: user_text.clone(),
            user_text,
            context: AdviseContext::default(),
        }
    }
}

/// Interceptor around a model call.
#[async_trait]
pub trait Advisor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs before the model call, in registration order.
    async fn before(&self, _request: &mut ChatRequest) -> Result<()> {
        Ok(())
    }

    /// Runs after the response has been fully received, in reverse registration order.
    async fn after(&self, _request: &ChatRequest, _response: &str) -> Result<()> {
        Ok(())
    }
}

/// Advisors in the fixed order they were registered.
#[derive(Default)]
pub struct AdvisorChain {
    advisors: Vec<Box<dyn Advisor>>,
}

impl AdvisorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an advisor; builder style.
    pub fn with(mut self, advisor: impl Advisor + 'static) -> Self {
        self.push(Box::new(advisor));
        self
    }

    pub fn push(&mut self, advisor: Box<dyn Advisor>) {
        self.advisors.push(advisor);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.advisors.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.advisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.advisors.is_empty()
    }

    pub async fn before(&self, request: &mut ChatRequest) -> Result<()> {
        for advisor in &self.advisors {
            trace!("before: {}", advisor.name());
            advisor.before(request).await?;
        }
        Ok(())
    }

    pub async fn after(&self, request: &ChatRequest, response: &str) -> Result<()> {
        for advisor in self.advisors.iter().rev() {
            trace!("after: {}", advisor.name());
            advisor.after(request, response).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Advisor for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn before(&self, request: &mut ChatRequest) -> Result<()> {
            self.calls.lock().unwrap().push(format!("before {}", self.name));
            request.user_message.push_str(self.name);
            Ok(())
        }

        async fn after(&self, _request: &ChatRequest, _response: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("after {}", self.name));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_chain_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let chain = AdvisorChain::new()
            .with(Recorder {
                name: "a",
                calls: calls.clone(),
            })
            .with(Recorder {
                name: "b",
                calls: calls.clone(),
            });

        let mut request = ChatRequest::new("system", "q:");
        chain.before(&mut request).await.unwrap();
        chain.after(&request, "answer").await.unwrap();

        assert_eq!(request.user_message, "q:ab");
        assert_eq!(request.user_text, "q:");
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["before a", "before b", "after b", "after a"]
        );
        assert_eq!(chain.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_context_typed_access() {
        let mut context = AdviseContext::default();
        context.insert(
            RETRIEVED_DOCUMENTS,
            ContextValue::Documents(vec![Document::new("doc")]),
        );
        context.insert("note", ContextValue::Text("hi".into()));

        assert_eq!(context.documents(RETRIEVED_DOCUMENTS).map(|d| d.len()), Some(1));
        assert_eq!(context.text("note"), Some("hi"));
        assert!(context.documents("note").is_none());
        assert!(context.get("missing").is_none());
    }
}
