use serde_json::Value;

use crate::events::StreamEvent;

const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";
const IGNORED_FIELDS: [&str; 3] = ["event:", "id:", "retry:"];

/// Incremental parser for the newline-delimited event stream.
///
/// Raw bytes are buffered until a full line is available, so JSON payloads and
/// multi-byte characters split across network reads are reassembled before decoding.
#[derive(Debug, Default)]
pub struct SseLineParser {
    buffer: Vec<u8>,
    done: bool,
}

impl SseLineParser {
    /// Feed arbitrary bytes into the parser and drain events from complete lines.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        if self.done {
            return Vec::new();
        }

        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(split) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=split).collect();
            if self.push_line(&line[..split], &mut events) {
                break;
            }
        }

        events
    }

    /// Parse whatever unterminated line remains once the body has ended.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.done || self.buffer.is_empty() {
            self.buffer.clear();
            return events;
        }

        let line = std::mem::take(&mut self.buffer);
        self.push_line(&line, &mut events);
        events
    }

    /// Parse a complete stream body in one shot.
    pub fn parse_lines(input: &str) -> Vec<StreamEvent> {
        let mut parser = Self::default();
        let mut events = parser.feed(input.as_bytes());
        events.extend(parser.finish());
        events
    }

    /// True once the terminal marker has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }

    /// Returns true when the line terminated the stream.
    fn push_line(&mut self, line: &[u8], events: &mut Vec<StreamEvent>) -> bool {
        let line = String::from_utf8_lossy(line);
        let Some(event) = parse_line(&line) else {
            return false;
        };

        if event.is_terminal() {
            self.done = true;
            self.buffer.clear();
        }
        events.push(event);
        self.done
    }
}

fn parse_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    let payload = match line.strip_prefix(DATA_PREFIX) {
        Some(payload) => payload.trim(),
        None if IGNORED_FIELDS.iter().any(|field| line.starts_with(field)) => return None,
        None => line,
    };

    if payload.is_empty() {
        return None;
    }
    if payload == DONE_MARKER {
        return Some(StreamEvent::Done);
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(value) => fragment_text(&value).map(StreamEvent::fragment),
        Err(error) => {
            tracing::warn!(%error, frame = payload, "skipping undecodable stream frame");
            None
        }
    }
}

/// Gateway frames carry `token`; raw OpenAI-style frames carry `choices[0].delta.content`.
fn fragment_text(value: &Value) -> Option<&str> {
    value
        .get("token")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .or_else(|| {
            value
                .pointer("/choices/0/delta/content")
                .and_then(Value::as_str)
                .filter(|text| !text.is_empty())
        })
}
