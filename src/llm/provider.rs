//! LLM provider trait.

use async_trait::async_trait;

use super::error::LLMError;
use super::types::{ChatRequest, ChatStream};

/// Trait for LLM providers with different API formats.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Start a streaming chat completion.
    ///
    /// The returned stream yields tokens in arrival order and ends with
    /// `StreamEvent::Done`. Dropping it cancels the underlying request.
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, LLMError>;
}
