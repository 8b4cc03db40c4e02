//! Event framing shared by the relay (encoding) and the renderer (decoding).
//!
//! Every event is one `data: ` line followed by a blank line. Fragments carry
//! an OpenAI-shaped JSON chunk, the terminal event carries the `[DONE]` literal.

use log::debug;
use serde::Deserialize;
use serde_json::json;

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment { text: String },
    Done,
}

impl StreamEvent {
    pub fn fragment(text: impl Into<String>) -> Self {
        StreamEvent::Fragment { text: text.into() }
    }

    /// The payload that follows `data: ` on the wire.
    pub fn payload(&self) -> String {
        match self {
            StreamEvent::Fragment { text } =>
                json!({
                    "choices": [{
                        "delta": { "content": text },
                        "index": 0
                    }]
                }).to_string(),
            StreamEvent::Done => DONE_SENTINEL.to_string(),
        }
    }

    pub fn to_sse(&self) -> String {
        format!("{}{}\n\n", DATA_PREFIX, self.payload())
    }
}

#[derive(Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    #[serde(default)]
    delta: Option<WireDelta>,
}

#[derive(Deserialize)]
struct WireDelta {
    content: Option<String>,
}

/// Interprets one complete line. Returns `None` for anything that is not an
/// event: padding, blank separators, unparsable payloads and chunks without
/// text.
pub fn parse_line(line: &str) -> Option<StreamEvent> {
    let data = line.strip_prefix(DATA_PREFIX)?;
    if data == DONE_SENTINEL {
        return Some(StreamEvent::Done);
    }

    match serde_json::from_str::<WireChunk>(data) {
        Ok(chunk) => {
            let text = chunk.choices
                .into_iter()
                .next()
                .and_then(|c| c.delta)
                .and_then(|d| d.content)?;
            if text.is_empty() {
                None
            } else {
                Some(StreamEvent::Fragment { text })
            }
        }
        Err(e) => {
            debug!("Skipping malformed event payload: {} ({})", data, e);
            None
        }
    }
}

/// Splits a byte stream into complete lines, carrying the unterminated tail
/// over to the next read. Works on bytes so that a read boundary inside a
/// multi-byte character is carried over as well.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Drops whatever unterminated tail is left once the stream has ended.
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() {
            debug!("Discarding {} unterminated bytes at end of stream", self.buffer.len());
            self.buffer.clear();
        }
    }
}

/// Line decoder plus event interpretation in one step.
#[derive(Debug, Default)]
pub struct EventDecoder {
    lines: SseLineDecoder,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.lines
            .push(bytes)
            .iter()
            .filter_map(|line| parse_line(line))
            .collect()
    }

    pub fn finish(&mut self) {
        self.lines.finish();
    }
}
