//! OpenAI chat completions provider.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;

use super::error::{LLMError, StreamErrorBody, check_response};
use super::provider::LLMProvider;
use super::sse::SseEventStream;
use super::types::{ChatRequest, ChatStream, Message, StreamEvent, Usage};

/// OpenAI-compatible provider.
pub struct OpenAIProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAIProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

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
impl LLMProvider for OpenAIProvider {
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, LLMError> {
        let url = format!("{}/chat/completions", self.base_url);

        let stream_request = StreamRequest {
            model: request.model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
            stream_options: StreamOptions {
                include_usage: true,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&stream_request)
            .send()
            .await?;
        let response = check_response(response).await?;

        let sse_stream = SseEventStream::new(response.bytes_stream());
        Ok(Box::pin(OpenAIStreamAdapter::new(sse_stream)))
    }
}

// ============================================================================
// Streaming
// ============================================================================

#[derive(serde::Serialize)]
struct StreamRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    stream_options: StreamOptions,
}

#[derive(serde::Serialize)]
struct StreamOptions {
    include_usage: bool,
}

/// Maps OpenAI SSE chunks to `StreamEvent`s.
struct OpenAIStreamAdapter<S> {
    inner: SseEventStream<S>,
    usage: Option<Usage>,
    done: bool,
}

impl<S> OpenAIStreamAdapter<S> {
    fn new(inner: SseEventStream<S>) -> Self {
        Self {
            inner,
            usage: None,
            done: false,
        }
    }
}

impl<S> Stream for OpenAIStreamAdapter<S>
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
                    if event.data == "[DONE]" {
                        self.done = true;
                        return Poll::Ready(Some(Ok(StreamEvent::Done {
                            usage: self.usage.take(),
                        })));
                    }

                    match serde_json::from_str::<StreamChunk>(&event.data) {
                        Ok(chunk) => {
                            if let Some(error) = chunk.error {
                                self.done = true;
                                return Poll::Ready(Some(Err(error.into())));
                            }
                            if chunk.usage.is_some() {
                                self.usage = chunk.usage;
                            }
                            if let Some(choice) = chunk.choices.into_iter().next()
                                && let Some(content) = choice.delta.content
                                && !content.is_empty()
                            {
                                return Poll::Ready(Some(Ok(StreamEvent::Token(content))));
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                data = %event.data,
                                error = %e,
                                "failed to parse OpenAI SSE chunk"
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

#[derive(serde::Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<StreamErrorBody>,
}

#[derive(serde::Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(serde::Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use futures::StreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gpt-3.5-turbo".to_string(),
            messages: vec![
                Message::new(Role::System, "You are a historian."),
                Message::new(Role::User, "When did Rome fall?"),
            ],
            temperature: Some(0.7),
            max_tokens: None,
        }
    }

    fn sse_body() -> String {
        [
            r#"data: {"choices":[{"delta":{"role":"assistant","content":""}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"In "}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"476 AD."}}]}"#,
            r#"data: {"choices":[],"usage":{"prompt_tokens":12,"completion_tokens":4,"total_tokens":16}}"#,
            "data: [DONE]",
        ]
        .iter()
        .map(|line| format!("{line}\n\n"))
        .collect()
    }

    #[tokio::test]
    async fn test_chat_stream_yields_tokens_then_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-3.5-turbo",
                "stream": true,
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_body()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider =
            OpenAIProvider::new(Client::new(), "sk-test".to_string(), server.uri());
        let events: Vec<StreamEvent> = provider
            .chat_stream(request())
            .await
            .unwrap()
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Token("In ".to_string()),
                StreamEvent::Token("476 AD.".to_string()),
                StreamEvent::Done {
                    usage: Some(Usage {
                        prompt_tokens: 12,
                        completion_tokens: 4,
                        total_tokens: 16,
                    }),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_error_chunk_ends_stream_with_error() {
        let body: String = [
            r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#,
            r#"data: {"error":{"message":"You exceeded your current quota","type":"insufficient_quota","param":null,"code":"insufficient_quota"}}"#,
        ]
        .iter()
        .map(|line| format!("{line}\n\n"))
        .collect();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(Client::new(), "sk-test".to_string(), server.uri());
        let items: Vec<_> = provider.chat_stream(request()).await.unwrap().collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].as_ref().unwrap(),
            &StreamEvent::Token("Hel".to_string())
        );
        match &items[1] {
            Err(LLMError::Api { status, message }) => {
                assert_eq!(*status, 200);
                assert_eq!(message, "You exceeded your current quota");
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_key_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(Client::new(), "bad".to_string(), server.uri());
        let err = match provider.chat_stream(request()).await {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(matches!(err, LLMError::Authentication { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_rate_limit_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(Client::new(), "sk".to_string(), server.uri());
        let err = match provider.chat_stream(request()).await {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(matches!(
            err,
            LLMError::RateLimit {
                retry_after: Some(7)
            }
        ));
    }
}
