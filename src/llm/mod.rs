//! Streaming LLM provider clients.

mod client;
mod error;
mod gemini;
mod openai;
mod provider;
pub mod selector;
mod sse;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use client::ModelClient;
pub use error::LLMError;
pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;
pub use provider::LLMProvider;
pub use selector::{ClientSpec, HttpClientFactory, ModelClientFactory};
pub use sse::{SseEvent, SseEventStream};
pub use types::{ChatRequest, ChatStream, Message, Role, StreamEvent, Usage};
