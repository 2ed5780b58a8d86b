//! Incremental decoder for OpenAI-style server-sent events.
//!
//! Network chunks may split a line (or a multi-byte character) anywhere, so
//! bytes are buffered until a full line is available.

use serde::Deserialize;

const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

/// One meaningful item decoded from the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Non-empty `delta.content` text.
    Delta(String),
    /// The provider reported an error inside the stream.
    Error(String),
    /// `[DONE]` terminator.
    Done,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a network chunk and returns the events completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = decode_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Decodes whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&String::from_utf8_lossy(&rest))
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamErrorBody>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamErrorBody {
    message: String,
}

fn decode_line(line: &str) -> Option<SseEvent> {
    let line = line.trim_end_matches(['\r', '\n']);
    let payload = line.strip_prefix(DATA_PREFIX)?.trim_start();

    if payload == DONE_MARKER {
        return Some(SseEvent::Done);
    }
    if payload.is_empty() {
        return None;
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => {
            if let Some(error) = chunk.error {
                return Some(SseEvent::Error(error.message));
            }
            let text: String = chunk
                .choices
                .into_iter()
                .filter_map(|choice| choice.delta.and_then(|delta| delta.content))
                .collect();
            (!text.is_empty()).then_some(SseEvent::Delta(text))
        }
        Err(err) => {
            tracing::debug!("Skipping undecodable stream line: {}", err);
            None
        }
    }
}
