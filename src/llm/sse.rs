//! Server-Sent Events parser over a byte stream.
//!
//! Both providers stream their responses as SSE. This parser only handles the
//! parts of the format they use: `event:` and `data:` fields, comments, and
//! blank-line event boundaries.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

/// A single dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Splits a byte stream into SSE events.
pub struct SseEventStream<S> {
    inner: S,
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    done: bool,
}

impl<S> SseEventStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            event: None,
            data: Vec::new(),
            done: false,
        }
    }

    /// Feed one line; returns an event when the line is a boundary.
    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: self.event.take(),
            data,
        })
    }

    fn next_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(decode_line(line))
    }
}

fn decode_line(line: Vec<u8>) -> String {
    match String::from_utf8(line) {
        Ok(line) => line,
        Err(e) => {
            tracing::debug!(
                bytes = e.as_bytes().len(),
                valid_up_to = e.utf8_error().valid_up_to(),
                "replaced invalid UTF-8 in SSE line"
            );
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

impl<S, E> Stream for SseEventStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<SseEvent, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            while let Some(line) = self.next_line() {
                if let Some(event) = self.process_line(&line) {
                    return Poll::Ready(Some(Ok(event)));
                }
            }

            if self.done {
                // Trailing event without a final blank line
                if !self.buffer.is_empty() {
                    let rest = std::mem::take(&mut self.buffer);
                    let line = decode_line(rest);
                    let line = line.trim_end_matches('\r').to_string();
                    self.process_line(&line);
                }
                return Poll::Ready(self.dispatch().map(Ok));
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => self.buffer.extend_from_slice(&bytes),
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => self.done = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
