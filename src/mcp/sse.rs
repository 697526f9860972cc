//! `text/event-stream` framing.
//!
//! Events are separated by a blank line. Each event carries optional `id:`
//! and `event:` fields and one or more `data:` lines; comment lines start
//! with `:` and are used by servers as keep-alives.

use futures::{Stream, StreamExt};

use super::IntrospectionError;

/// A parsed SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    /// Event type, defaulting to `message` as the SSE format does.
    pub fn kind(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Parses one raw event block. Blocks without a `data:` line yield `None`.
pub fn parse_event(raw: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();
    let mut has_data = false;

    for line in raw.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "id" => event.id = Some(value.to_string()),
            "event" => event.event = Some(value.to_string()),
            "data" => {
                if has_data {
                    event.data.push('\n');
                }
                event.data.push_str(value);
                has_data = true;
            }
            // `retry` and unknown fields are ignored.
            _ => {}
        }
    }

    has_data.then_some(event)
}

/// Position of the first event terminator and its length.
fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    (0..buffer.len()).find_map(|i| {
        let rest = &buffer[i..];
        if rest.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else if rest.starts_with(b"\n\n") {
            Some((i, 2))
        } else {
            None
        }
    })
}

/// Incremental event reader over a byte stream.
///
/// Chunks may split an event (or a UTF-8 sequence) anywhere, so bytes are
/// buffered until a full event block is available.
pub struct EventStream<S> {
    inner: S,
    buffer: Vec<u8>,
}

impl<S, B> EventStream<S>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }

    /// Next complete event, or `None` once the stream has ended.
    pub async fn next_event(&mut self) -> Result<Option<SseEvent>, IntrospectionError> {
        loop {
            if let Some((end, terminator)) = find_event_boundary(&self.buffer) {
                let block: Vec<u8> = self.buffer.drain(..end + terminator).collect();
                let raw = String::from_utf8_lossy(&block[..end]);
                if let Some(event) = parse_event(&raw) {
                    return Ok(Some(event));
                }
                continue;
            }

            match self.inner.next().await {
                Some(chunk) => self.buffer.extend_from_slice(chunk?.as_ref()),
                None => {
                    // A final event without a trailing blank line still counts.
                    if self.buffer.is_empty() {
                        return Ok(None);
                    }
                    let block = std::mem::take(&mut self.buffer);
                    return Ok(parse_event(&String::from_utf8_lossy(&block)));
                }
            }
        }
    }
}
