//! Chat sessions.
//!
//! A session owns exactly one pipeline, built when the session starts from the
//! chosen profile and the credentials supplied for that session. Nothing is
//! shared between sessions.

mod credentials;
mod store;

pub use credentials::Credentials;
pub use store::SessionStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::chat::{MessageSink, SinkError};
use crate::llm::ModelClientFactory;
use crate::llm::selector;
use crate::pipeline::{Pipeline, PromptTemplate, TextOutputParser};
use crate::profile::{ProfileError, ProviderKind};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    UnknownProfile(#[from] ProfileError),

    #[error("missing credential '{key}'")]
    MissingCredential { key: &'static str },

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// State of one chat session.
#[derive(Debug)]
pub struct SessionContext {
    pub id: String,
    pub provider: ProviderKind,
    pub created_at: DateTime<Utc>,
    pipeline: Arc<Pipeline>,
}

impl SessionContext {
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }
}

/// Confirmation shown when a session starts.
pub fn confirmation(provider: ProviderKind) -> String {
    format!("starting chat using the {provider} profile model")
}

/// Start a session for `profile`.
///
/// Emits one confirmation message through `sink`, then builds the model
/// client from `credentials` and the pipeline around it. An unknown profile
/// fails before anything is emitted. A missing credential fails after the
/// confirmation.
pub async fn start_session<S>(
    profile: &str,
    credentials: &Credentials,
    factory: &dyn ModelClientFactory,
    sink: &mut S,
) -> Result<SessionContext, SessionError>
where
    S: MessageSink + ?Sized,
{
    let provider: ProviderKind = profile.parse()?;

    sink.send_message(&confirmation(provider)).await?;

    let spec = selector::select(provider);
    let api_key = credentials
        .get(spec.credential_key)
        .ok_or(SessionError::MissingCredential {
            key: spec.credential_key,
        })?;

    let model = factory.build(&spec, api_key.to_string());
    let pipeline = Pipeline::new(PromptTemplate::historian(), model, TextOutputParser);

    let id = format!("session_{}", ulid::Ulid::new().to_string().to_lowercase());
    info!(session_id = %id, profile = %provider, "session started");

    Ok(SessionContext {
        id,
        provider,
        created_at: Utc::now(),
        pipeline: Arc::new(pipeline),
    })
}
