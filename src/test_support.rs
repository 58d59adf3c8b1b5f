//! Deterministic stand-ins for the embedding provider and the chat model.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use futures::stream;

use crate::{
    embedding::Embedder,
    error::{ChatbotError, Result},
    model::{ChatModel, Prompt, TokenStream},
};

const VOCABULARY: &[&str] = &[
    "hurricane", "milton", "surge", "wind", "winds", "landfall", "florida", "tampa", "evacuation",
    "rain", "tornado", "category", "baking", "bread", "rust",
];

/// Bag-of-words embedder over a fixed vocabulary; unknown words are ignored.
#[derive(Debug, Default, Clone)]
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; VOCABULARY.len()];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
        {
            if let Some(i) = VOCABULARY.iter().position(|v| *v == word) {
                vector[i] += 1.0;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len()
    }
}

/// What the scripted model does on one call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream these fragments, then end.
    Reply(Vec<String>),
    /// Fail before any fragment is produced.
    Refuse(String),
    /// Stream these fragments, then yield an error.
    Break(Vec<String>, String),
}

impl Script {
    pub fn reply(fragments: &[&str]) -> Self {
        Script::Reply(fragments.iter().map(|f| f.to_string()).collect())
    }

    pub fn broken(fragments: &[&str], message: &str) -> Self {
        Script::Break(
            fragments.iter().map(|f| f.to_string()).collect(),
            message.to_string(),
        )
    }
}

/// Plays back [`Script`]s in order and records every prompt it receives.
/// Once the scripts run out it answers `"ok"`.
pub struct ScriptedModel {
    scripts: Mutex<VecDeque<Script>>,
    prompts: Arc<Mutex<Vec<Prompt>>>,
}

impl ScriptedModel {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn prompts(&self) -> Arc<Mutex<Vec<Prompt>>> {
        Arc::clone(&self.prompts)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn stream(&self, prompt: Prompt) -> Result<TokenStream> {
        self.prompts.lock().unwrap().push(prompt);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::reply(&["ok"]));

        let items: Vec<Result<String>> = match script {
            Script::Reply(fragments) => fragments.into_iter().map(Ok).collect(),
            Script::Refuse(message) => return Err(ChatbotError::Model(message)),
            Script::Break(fragments, message) => fragments
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(ChatbotError::Model(message))))
                .collect(),
        };
        Ok(Box::pin(stream::iter(items)))
    }
}
