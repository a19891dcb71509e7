//! Incremental decoding of the Messages API server-sent-event stream.
//!
//! Text deltas are forwarded as soon as their frame is complete. Anything that
//! goes wrong after the stream has opened just ends it; the caller keeps the
//! chunks already delivered.

use bytes::Bytes;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt::Display;

use crate::models::FeedbackStream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Splits a byte stream into SSE frames. Frames may arrive split across
/// any number of network chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut events = Vec::new();
        while let Some(index) = self.buffer.windows(2).position(|window| window == b"\n\n") {
            let frame: Vec<u8> = self.buffer.drain(..index + 2).collect();
            if let Some(event) = parse_frame(&frame[..index]) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_frame(frame: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(frame);
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }

    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error { error: StreamError },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

struct DeltaState<E> {
    body: BoxStream<'static, Result<Bytes, E>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
    emitted: usize,
}

impl<E: Display> DeltaState<E> {
    fn absorb(&mut self, bytes: &[u8]) {
        for event in self.decoder.push(bytes) {
            match serde_json::from_str::<StreamEvent>(&event.data) {
                Ok(StreamEvent::ContentBlockDelta {
                    delta: Delta::TextDelta { text },
                }) => {
                    if !text.is_empty() {
                        self.pending.push_back(text);
                    }
                }
                Ok(StreamEvent::MessageStop) => {
                    self.finished = true;
                    break;
                }
                Ok(StreamEvent::Error { error }) => {
                    log::warn!(
                        "⚠️ Provider aborted feedback stream ({}): {}",
                        error.kind,
                        error.message
                    );
                    self.finished = true;
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("⚠️ Unparsable stream event {:?}: {}", event.event, e);
                    self.finished = true;
                    break;
                }
            }
        }
    }
}

/// Turn a raw Messages API SSE body into a stream of text chunks.
pub fn text_deltas<S, E>(body: S) -> FeedbackStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DeltaState {
        body: body.boxed(),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
        emitted: 0,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(text) = state.pending.pop_front() {
                state.emitted += 1;
                return Some((text, state));
            }
            if state.finished {
                log::info!("🏁 Feedback stream closed after {} chunks", state.emitted);
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => state.absorb(&bytes),
                Some(Err(e)) => {
                    log::warn!(
                        "⚠️ Feedback stream interrupted after {} chunks: {}",
                        state.emitted,
                        e
                    );
                    state.finished = true;
                }
                None => state.finished = true,
            }
        }
    })
    .boxed()
}
