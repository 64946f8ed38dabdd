//! Session management HTTP handlers.

use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::chat::{BufferedMessage, ChatError, MessageSink, SinkError, handle_message};
use crate::response;
use crate::server::AppState;
use crate::session::{Credentials, SessionError, start_session};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    profile: String,
    #[serde(default)]
    env: Credentials,
}

#[derive(Serialize)]
pub struct CreateSessionResponse {
    session_id: String,
    profile: String,
    message: String,
    created_at: String,
}

#[derive(Serialize)]
pub struct GetSessionResponse {
    session_id: String,
    profile: String,
    model: String,
    created_at: String,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    content: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Response {
    let mut confirmation = BufferedMessage::new();
    let session = match start_session(
        &req.profile,
        &req.env,
        state.factory.as_ref(),
        &mut confirmation,
    )
    .await
    {
        Ok(session) => session,
        Err(e @ SessionError::UnknownProfile(_)) => {
            return response::bad_request(e.to_string());
        }
        Err(e @ SessionError::MissingCredential { .. }) => {
            return response::unauthorized(e.to_string());
        }
        Err(e @ SessionError::Sink(_)) => {
            return response::internal_error(e.to_string());
        }
    };

    let session = state.sessions.insert(session);

    let response = CreateSessionResponse {
        session_id: session.id.clone(),
        profile: session.provider.to_string(),
        message: confirmation.into_content(),
        created_at: session.created_at.to_rfc3339(),
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// GET /api/v1/sessions/{session_id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session) = state.sessions.get(&session_id) else {
        return response::not_found("Session not found");
    };

    let response = GetSessionResponse {
        session_id: session.id.clone(),
        profile: session.provider.to_string(),
        model: session.pipeline().model().model().to_string(),
        created_at: session.created_at.to_rfc3339(),
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// DELETE /api/v1/sessions/{session_id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    if state.sessions.remove(&session_id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        response::not_found("Session not found")
    }
}

/// POST /api/v1/sessions/{session_id}/messages
///
/// Streams the reply as SSE.
///
/// Events emitted:
/// - `token`: `{"content": "..."}` — one per fragment, in arrival order
/// - `done`: `{"message_id": "msg_...", "content": "..."}` — the complete message
/// - `error`: `{"message": "..."}` — the turn failed; earlier tokens stand
pub async fn send_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Response {
    let Some(session) = state.sessions.get(&session_id) else {
        return response::not_found("Session not found");
    };

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let message_id = format!("msg_{}", ulid::Ulid::new().to_string().to_lowercase());

    tokio::spawn(async move {
        let mut sink = SseMessage::new(tx, message_id);
        match handle_message(session.pipeline(), &req.content, &mut sink).await {
            Ok(()) => {}
            Err(ChatError::Sink(_)) => {
                debug!(session_id = %session.id, "client disconnected mid-stream");
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "chat turn failed");
                sink.fail(&e.to_string()).await;
            }
        }
    });

    let keep_alive = KeepAlive::new()
        .interval(Duration::from_secs(state.keep_alive_interval_seconds))
        .text("keep-alive");

    let events = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    Sse::new(events).keep_alive(keep_alive).into_response()
}

// ============================================================================
// SSE Streaming
// ============================================================================

const EVENT_BUFFER: usize = 32;

#[derive(Serialize)]
struct TokenData<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct DoneData<'a> {
    message_id: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ErrorData<'a> {
    message: &'a str,
}

fn json_event(name: &'static str, data: impl Serialize) -> Event {
    Event::default()
        .event(name)
        .json_data(data)
        .unwrap_or_else(|_| Event::default().event(name).data("{}"))
}

/// A message displayed over an SSE channel.
struct SseMessage {
    tx: mpsc::Sender<Event>,
    message_id: String,
    content: String,
}

impl SseMessage {
    fn new(tx: mpsc::Sender<Event>, message_id: String) -> Self {
        Self {
            tx,
            message_id,
            content: String::new(),
        }
    }

    async fn emit(&self, event: Event) -> Result<(), SinkError> {
        self.tx.send(event).await.map_err(|_| SinkError::Closed)
    }

    async fn fail(&self, message: &str) {
        let _ = self.emit(json_event("error", ErrorData { message })).await;
    }
}

#[async_trait]
impl MessageSink for SseMessage {
    async fn stream_token(&mut self, token: &str) -> Result<(), SinkError> {
        self.content.push_str(token);
        self.emit(json_event("token", TokenData { content: token }))
            .await
    }

    async fn send(&mut self) -> Result<(), SinkError> {
        let event = json_event(
            "done",
            DoneData {
                message_id: &self.message_id,
                content: &self.content,
            },
        );
        self.emit(event).await
    }
}
