//! A provider bound to a model and sampling settings.

use std::sync::Arc;

use super::error::LLMError;
use super::provider::LLMProvider;
use super::types::{ChatRequest, ChatStream, Message};

/// The model stage of a pipeline.
#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn LLMProvider>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn stream(&self, messages: Vec<Message>) -> Result<ChatStream, LLMError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        self.provider.chat_stream(request).await
    }
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}
