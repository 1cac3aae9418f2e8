//! Event-stream decoding.
//!
//! Wire format: `event: <type>` and `data: <payload>` lines, a blank line
//! terminating each event, `:`-prefixed keep-alive comments. Consecutive
//! `data:` values are concatenated as-is. A `data: [DONE]` line ends the
//! stream outright.

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use memchr::memchr;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;

use super::BodyStream;

pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Log,
    Partial,
    Final,
    /// Events without an `event:` line.
    Message,
    Other(String),
}

impl EventKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "log" => EventKind::Log,
            "partial" => EventKind::Partial,
            "final" => EventKind::Final,
            "message" | "" => EventKind::Message,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Log => "log",
            EventKind::Partial => "partial",
            EventKind::Final => "final",
            EventKind::Message => "message",
            EventKind::Other(other) => other,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub kind: EventKind,
    pub payload: Value,
}

impl StreamEvent {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self { kind, payload }
    }
}

/// Incremental decoder. Feed it raw chunks as they arrive; it buffers
/// partial lines and partial events across calls.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    event_type: Option<String>,
    data: String,
    finished: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of the accumulated input as possible.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.buffer.extend_from_slice(chunk);
        let mut start = 0;

        while let Some(relative_pos) = memchr(b'\n', &self.buffer[start..]) {
            let newline_index = start + relative_pos;
            let mut line_end = newline_index;
            if line_end > start && self.buffer[line_end - 1] == b'\r' {
                line_end -= 1;
            }

            let line = String::from_utf8_lossy(&self.buffer[start..line_end]).into_owned();
            start = newline_index + 1;

            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
            if self.finished {
                break;
            }
        }

        if self.finished {
            self.buffer.clear();
        } else if start > 0 {
            self.buffer.drain(..start);
        }

        events
    }

    /// End of input. Anything without a terminating blank line is dropped.
    pub fn finish(&mut self) {
        self.buffer.clear();
        self.data.clear();
        self.event_type = None;
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn process_line(&mut self, line: &str) -> Option<StreamEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        if let Some(value) = line.strip_prefix("event:") {
            let value = value.trim();
            self.event_type = (!value.is_empty()).then(|| value.to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            let value = value.trim();
            if value == DONE_SENTINEL {
                self.finish();
                return None;
            }
            self.data.push_str(value);
        }

        None
    }

    fn dispatch(&mut self) -> Option<StreamEvent> {
        let data = std::mem::take(&mut self.data);
        let event_type = self.event_type.take();
        if data.is_empty() {
            return None;
        }

        let kind = event_type
            .as_deref()
            .map(EventKind::from_name)
            .unwrap_or(EventKind::Message);
        Some(StreamEvent::new(kind, parse_payload(data)))
    }
}

/// JSON when the payload parses, otherwise the raw text as a JSON string.
pub fn parse_payload(data: String) -> Value {
    serde_json::from_str(&data).unwrap_or(Value::String(data))
}

pub type SseEventStream = BoxStream<'static, Result<StreamEvent, String>>;

struct DecodeState {
    body: BodyStream,
    decoder: StreamDecoder,
    pending: VecDeque<StreamEvent>,
}

/// Lazily decode a response body. Dropping the returned stream drops the
/// body, which releases the underlying connection.
pub fn events(body: BodyStream) -> SseEventStream {
    let state = DecodeState {
        body,
        decoder: StreamDecoder::new(),
        pending: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.decoder.is_finished() {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let decoded = state.decoder.push(&chunk);
                    state.pending.extend(decoded);
                }
                Some(Err(err)) => {
                    state.decoder.finish();
                    return Some((Err(err), state));
                }
                None => {
                    state.decoder.finish();
                    return None;
                }
            }
        }
    })
    .boxed()
}
