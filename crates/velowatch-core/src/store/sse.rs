//! Server-sent event decoding
//!
//! The store's streaming REST surface speaks `text/event-stream`. HTTP
//! chunk boundaries fall anywhere, so the decoder buffers bytes and only
//! interprets complete lines, dispatching an event per blank line.

/// One decoded stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name from the `event:` field, `"message"` when absent
    pub event: String,
    /// Payload from the `data:` field(s); multi-line data is joined with `\n`
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event completed by this chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            // Multi-byte characters never contain a newline byte, so a
            // complete line is always valid UTF-8 if the stream is.
            let line = String::from_utf8_lossy(&line).into_owned();
            if let Some(event) = self.take_line(&line) {
                events.push(event);
            }
        }
        events
    }

    fn take_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            // Blank line dispatches the accumulated event, if any.
            let data = std::mem::take(&mut self.data);
            let event = self.event.take();
            if data.is_empty() {
                return None;
            }
            return Some(SseEvent {
                event: event.unwrap_or_else(|| "message".to_string()),
                data: data.join("\n"),
            });
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
            // id and retry are not used by this transport
            _ => {}
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: put\ndata: {\"path\":\"/\",\"data\":null}\n\n");

        assert_eq!(
            events,
            vec![SseEvent {
                event: "put".into(),
                data: "{\"path\":\"/\",\"data\":null}".into(),
            }]
        );
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.push(b"event: pu").is_empty());
        assert!(decoder.push(b"t\ndata: {\"path\":\"/a\"").is_empty());
        let events = decoder.push(b",\"data\":7}\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "put");
        assert_eq!(events[0].data, "{\"path\":\"/a\",\"data\":7}");
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let events =
            decoder.push(b"event: put\ndata: 1\n\nevent: keep-alive\ndata: null\n\n");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "put");
        assert_eq!(events[1].event, "keep-alive");
        assert_eq!(events[1].data, "null");
    }

    #[test]
    fn test_multi_line_data_is_joined() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: first\ndata: second\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "first\nsecond");
    }

    #[test]
    fn test_comments_and_blank_lines_are_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": heartbeat\n\n\nevent: put\ndata: 1\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "put");
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: put\r\ndata: 1\r\n\r\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "1");
    }

    #[test]
    fn test_value_without_leading_space() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event:put\ndata:1\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "put");
        assert_eq!(events[0].data, "1");
    }
}
