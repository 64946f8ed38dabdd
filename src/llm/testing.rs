//! In-memory provider for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use super::error::LLMError;
use super::provider::LLMProvider;
use super::types::{ChatRequest, ChatStream, StreamEvent};

/// Replays a fixed list of tokens, optionally failing after them.
#[derive(Default)]
pub struct ScriptedProvider {
    tokens: Vec<String>,
    fail_with: Option<u16>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Fail with an API error of `status` after the scripted tokens.
    pub fn failing_after(tokens: &[&str], status: u16) -> Self {
        Self {
            fail_with: Some(status),
            ..Self::new(tokens)
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, LLMError> {
        self.requests.lock().unwrap().push(request);

        let mut events: Vec<Result<StreamEvent, LLMError>> = self
            .tokens
            .iter()
            .map(|t| Ok(StreamEvent::Token(t.clone())))
            .collect();
        match self.fail_with {
            Some(status) => events.push(Err(LLMError::Api {
                status,
                message: "upstream failure".to_string(),
            })),
            None => events.push(Ok(StreamEvent::Done { usage: None })),
        }

        Ok(Box::pin(stream::iter(events)))
    }
}
