//! Incremental decoder for the exec event stream.
//!
//! Blocks are separated by exactly `"\n\n"`. Inside a block every `data:`
//! line contributes one line to a JSON payload `{type, data?, error?, exitCode?}`.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde_json::Value;

use crate::core::utf8::Utf8Decoder;
use crate::sandbox::error::{SandboxError, SandboxResult};

const BLOCK_SEPARATOR: &str = "\n\n";

/// One decoded event of a streamed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Start,
    Stdout(String),
    Stderr(String),
    Complete { exit_code: Option<i64> },
    Error { message: Option<String> },
}

/// Chunk-boundary independent SSE decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    utf8: Utf8Decoder,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.utf8.decode(chunk, &mut self.buffer);
        self.drain_blocks()
    }

    /// Flushes undecoded bytes once more. An unterminated trailing block
    /// is discarded.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        self.utf8.finish(&mut self.buffer);
        let events = self.drain_blocks();
        if !self.buffer.trim().is_empty() {
            tracing::debug!(
                residual_len = self.buffer.len(),
                "discarding unterminated SSE block"
            );
        }
        self.buffer.clear();
        events
    }

    fn drain_blocks(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(marker) = self.buffer.find(BLOCK_SEPARATOR) {
            let block: String = self.buffer.drain(..marker + BLOCK_SEPARATOR.len()).collect();
            if let Some(event) = decode_block(&block[..marker]) {
                events.push(event);
            }
        }
        events
    }
}

/// Decodes one block (without its separator).
fn decode_block(block: &str) -> Option<StreamEvent> {
    let data = block
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n");
    if data.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(&data) {
        Ok(value) => parse_stream_event(&value),
        Err(err) => {
            tracing::warn!(error = %err, "failed to parse SSE event");
            None
        }
    }
}

/// Interprets a decoded payload. Unknown types and payloads with the
/// wrong shape yield `None`.
pub fn parse_stream_event(value: &Value) -> Option<StreamEvent> {
    let event_type = value.get("type")?.as_str()?;
    let text = |field: &str| value.get(field).and_then(Value::as_str).map(String::from);

    match event_type {
        "start" => Some(StreamEvent::Start),
        "stdout" => text("data").map(StreamEvent::Stdout),
        "stderr" => text("data").map(StreamEvent::Stderr),
        "error" => Some(StreamEvent::Error {
            message: text("error"),
        }),
        "complete" => Some(StreamEvent::Complete {
            exit_code: value.get("exitCode").and_then(|code| {
                code.as_i64()
                    .or_else(|| code.as_f64().map(|f| f as i64))
            }),
        }),
        other => {
            tracing::debug!(event_type = other, "ignoring unknown stream event");
            None
        }
    }
}

/// Adapts a byte stream into decoded stream events.
pub struct SseEventStream<S> {
    inner: S,
    decoder: SseDecoder,
    queued: VecDeque<StreamEvent>,
    done: bool,
}

impl<S> SseEventStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: SseDecoder::new(),
            queued: VecDeque::new(),
            done: false,
        }
    }
}

impl<S, B, E> Stream for SseEventStream<S>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    type Item = SandboxResult<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let events = self.decoder.push(chunk.as_ref());
                    self.queued.extend(events);
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(SandboxError::transport(format!(
                        "Stream error: {e}"
                    )))));
                }
                Poll::Ready(None) => {
                    let events = self.decoder.finish();
                    self.queued.extend(events);
                    self.done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
