//! Google Gemini provider with native API format.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;

use super::error::{LLMError, StreamErrorBody, check_response};
use super::provider::LLMProvider;
use super::sse::SseEventStream;
use super::types::{ChatRequest, ChatStream, Role, StreamEvent, Usage};

/// Gemini provider using `streamGenerateContent`.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";

    #[must_use]
    pub fn new(client: Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, LLMError> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, request.model
        );
        let gemini_request = to_request(&request);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&gemini_request)
            .send()
            .await?;
        let response = check_response(response).await?;

        let sse_stream = SseEventStream::new(response.bytes_stream());
        Ok(Box::pin(GeminiStreamAdapter::new(sse_stream)))
    }
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Request {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

fn text_content(role: Option<&str>, text: &str) -> Content {
    Content {
        role: role.map(str::to_string),
        parts: vec![Part {
            text: Some(text.to_string()),
        }],
    }
}

fn to_request(request: &ChatRequest) -> Request {
    let mut system: Vec<&str> = Vec::new();
    let mut contents = Vec::new();

    for msg in &request.messages {
        match msg.role {
            // Gemini takes the system prompt as a separate field
            Role::System => system.push(&msg.content),
            Role::User => contents.push(text_content(Some("user"), &msg.content)),
            Role::Assistant => contents.push(text_content(Some("model"), &msg.content)),
        }
    }

    let system_instruction =
        (!system.is_empty()).then(|| text_content(None, &system.join("\n\n")));

    let generation_config = (request.temperature.is_some() || request.max_tokens.is_some())
        .then_some(GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        });

    Request {
        system_instruction,
        contents,
        generation_config,
    }
}

// ============================================================================
// Streaming
// ============================================================================

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    error: Option<StreamErrorBody>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl From<UsageMetadata> for Usage {
    fn from(u: UsageMetadata) -> Self {
        Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        }
    }
}

/// Maps Gemini SSE chunks to `StreamEvent`s.
///
/// Gemini has no explicit end marker; `Done` is emitted when the HTTP body ends.
struct GeminiStreamAdapter<S> {
    inner: SseEventStream<S>,
    usage: Option<Usage>,
    done: bool,
}

impl<S> GeminiStreamAdapter<S> {
    fn new(inner: SseEventStream<S>) -> Self {
        Self {
            inner,
            usage: None,
            done: false,
        }
    }
}

impl<S> Stream for GeminiStreamAdapter<S>
where
    S: Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Unpin,
{
    type Item = Result<StreamEvent, LLMError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    match serde_json::from_str::<StreamChunk>(&event.data) {
                        Ok(chunk) => {
                            if let Some(error) = chunk.error {
                                self.done = true;
                                return Poll::Ready(Some(Err(error.into())));
                            }
                            if let Some(usage) = chunk.usage_metadata {
                                self.usage = Some(usage.into());
                            }
                            let text: String = chunk
                                .candidates
                                .into_iter()
                                .next()
                                .and_then(|c| c.content)
                                .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
                                .unwrap_or_default();
                            if !text.is_empty() {
                                return Poll::Ready(Some(Ok(StreamEvent::Token(text))));
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                data = %event.data,
                                error = %e,
                                "failed to parse Gemini SSE chunk"
                            );
                        }
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(LLMError::Request(e))));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    return Poll::Ready(Some(Ok(StreamEvent::Done {
                        usage: self.usage.take(),
                    })));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
