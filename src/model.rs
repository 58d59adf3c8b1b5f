//! # Chat model
//!
//! The streaming boundary between the chatbot and a language model.
//!
//! A [`ChatModel`] takes a fully assembled [`Prompt`] and hands back a
//! [`TokenStream`]: a finite, in-order stream of text fragments that ends when
//! the model is done. [`OpenAiChatModel`] implements it on top of
//! `async-openai` and works with any OpenAI-compatible endpoint.

use std::pin::Pin;

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
        CreateChatCompletionStreamResponse,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt, future};
use tracing::{debug, error};

use crate::{
    advisor::ChatRequest,
    error::{ChatbotError, Result},
    memory::{Role, Turn},
};

/// Text fragments of one response, in arrival order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Everything sent to the model for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub history: Vec<Turn>,
    pub user: String,
}

impl Prompt {
    /// Prompt for an advised request: system, then history, then the (possibly augmented) user message.
    pub fn from_request(request: &ChatRequest) -> Self {
        Self {
            system: request.system_prompt.clone(),
            history: request.history.clone(),
            user: request.user_message.clone(),
        }
    }

    /// Chat completion messages in send order.
    #[allow(deprecated)]
    pub fn to_messages(&self) -> Vec<ChatCompletionRequestMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(self.system.clone()),
                name: None,
            },
        ));

        for turn in &self.history {
            messages.push(match turn.role {
                Role::User => user_message(turn.content.clone()),
                Role::Assistant => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessage {
                        content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                            turn.content.clone(),
                        )),
                        name: None,
                        refusal: None,
                        audio: None,
                        tool_calls: None,
                        function_call: None,
                    },
                ),
            });
        }

        messages.push(user_message(self.user.clone()));
        messages
    }
}

fn user_message(content: String) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
        content: ChatCompletionRequestUserMessageContent::Text(content),
        name: None,
    })
}

/// A language model that streams its answer.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn stream(&self, prompt: Prompt) -> Result<TokenStream>;
}

/// [`ChatModel`] for OpenAI-compatible chat completion endpoints.
pub struct OpenAiChatModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiChatModel {
    pub fn new(client: Client<OpenAIConfig>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Concatenated delta text of one chunk; `None` when the chunk carries no text.
fn chunk_text(response: &CreateChatCompletionStreamResponse) -> Option<String> {
    let text: String = response
        .choices
        .iter()
        .filter_map(|choice| choice.delta.content.as_deref())
        .collect();
    (!text.is_empty()).then_some(text)
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn stream(&self, prompt: Prompt) -> Result<TokenStream> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone()).messages(prompt.to_messages());
        if let Some(temperature) = self.temperature {
            args.temperature(temperature);
        }
        let request = args.build()?;

        debug!("Sending request: {:?}", request);
        let stream = self.client.chat().create_stream(request).await?;

        let fragments = stream.filter_map(|result| {
            future::ready(match result {
                Ok(response) => chunk_text(&response).map(Ok),
                Err(err) => {
                    error!("Received error: {}", err);
                    Some(Err(ChatbotError::from(err)))
                }
            })
        });
        Ok(Box::pin(fragments))
    }
}
