//! Display targets for chat messages.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum SinkError {
    /// The consumer went away (client disconnected, stdout closed).
    #[error("message sink closed")]
    Closed,
}

/// A message that is built up from fragments and then sent as a whole.
#[async_trait]
pub trait MessageSink: Send {
    /// Append a fragment to the message being displayed.
    async fn stream_token(&mut self, token: &str) -> Result<(), SinkError>;

    /// Finalize the message.
    async fn send(&mut self) -> Result<(), SinkError>;

    /// Display a complete message in one step.
    async fn send_message(&mut self, content: &str) -> Result<(), SinkError> {
        self.stream_token(content).await?;
        self.send().await
    }
}

/// Collects fragments in memory.
#[derive(Debug, Default, Clone)]
pub struct BufferedMessage {
    content: String,
    sends: usize,
}

impl BufferedMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Number of times `send` was called.
    pub fn sends(&self) -> usize {
        self.sends
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

#[async_trait]
impl MessageSink for BufferedMessage {
    async fn stream_token(&mut self, token: &str) -> Result<(), SinkError> {
        self.content.push_str(token);
        Ok(())
    }

    async fn send(&mut self) -> Result<(), SinkError> {
        self.sends += 1;
        Ok(())
    }
}

/// Writes fragments straight to an async writer, flushing after each one.
pub struct WriterMessage<W> {
    writer: W,
}

impl<W> WriterMessage<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> MessageSink for WriterMessage<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn stream_token(&mut self, token: &str) -> Result<(), SinkError> {
        self.writer
            .write_all(token.as_bytes())
            .await
            .map_err(|_| SinkError::Closed)?;
        self.writer.flush().await.map_err(|_| SinkError::Closed)
    }

    async fn send(&mut self) -> Result<(), SinkError> {
        self.writer
            .write_all(b"\n")
            .await
            .map_err(|_| SinkError::Closed)?;
        self.writer.flush().await.map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_message_appends_and_sends_once() {
        let mut msg = BufferedMessage::new();
        msg.send_message("hello").await.unwrap();
        assert_eq!(msg.content(), "hello");
        assert_eq!(msg.sends(), 1);
    }

    #[tokio::test]
    async fn test_writer_message_terminates_with_newline() {
        let mut msg = WriterMessage::new(Vec::new());
        msg.stream_token("Veni, ").await.unwrap();
        msg.stream_token("vidi, vici.").await.unwrap();
        msg.send().await.unwrap();
        assert_eq!(msg.into_inner(), b"Veni, vidi, vici.\n");
    }
}
