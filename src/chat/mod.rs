//! Per-message streaming into a display sink.

mod sink;

pub use sink::{BufferedMessage, MessageSink, SinkError, WriterMessage};

use futures::StreamExt;
use thiserror::Error;
use tracing::debug;

use crate::llm::LLMError;
use crate::pipeline::{Pipeline, PipelineError};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("stream failed: {0}")]
    Llm(#[from] LLMError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Stream one user message through `pipeline` into `sink`.
///
/// Fragments are forwarded as they arrive. `send` is called once after the
/// stream ends. On error the fragments already forwarded stay in the sink and
/// `send` is not called. Returning early drops the stream, cancelling the
/// provider request.
pub async fn handle_message<S>(
    pipeline: &Pipeline,
    content: &str,
    sink: &mut S,
) -> Result<(), ChatError>
where
    S: MessageSink + ?Sized,
{
    let mut fragments = pipeline.stream(content).await?;

    let mut count = 0usize;
    while let Some(fragment) = fragments.next().await {
        sink.stream_token(&fragment?).await?;
        count += 1;
    }

    sink.send().await?;
    debug!(fragments = count, "message sent");
    Ok(())
}
