//! Server-sent event line buffering
//!
//! Chunks arrive at arbitrary byte boundaries. Complete lines are split off
//! and `data:` payloads are yielded; a `[DONE]` payload ends the stream.

/// A decoded SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of a `data:` line
    Data(String),
    /// The `[DONE]` sentinel
    Done,
}

/// Accumulates bytes and yields events for complete lines
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the events of every completed line
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line that had no newline
    pub fn finish(&mut self) -> Option<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }
}

fn parse_line(line: &[u8]) -> Option<SseEvent> {
    let line = std::str::from_utf8(line).ok()?.trim();
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    Some(SseEvent::Data(data.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_across_chunks() {
        let mut buf = SseBuffer::new();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        let events = buf.push(b":1}\r\n\r\ndata: [DONE]\n");
        assert_eq!(
            events,
            vec![SseEvent::Data("{\"a\":1}".into()), SseEvent::Done]
        );
    }

    #[test]
    fn test_ignores_comments_and_other_fields() {
        let mut buf = SseBuffer::new();
        let events = buf.push(b": keep-alive\nevent: message\ndata:x\n");
        assert_eq!(events, vec![SseEvent::Data("x".into())]);
    }

    #[test]
    fn test_multibyte_split() {
        let mut buf = SseBuffer::new();
        let bytes = "data: héllo\n".as_bytes();
        assert!(buf.push(&bytes[..8]).is_empty());
        assert_eq!(buf.push(&bytes[8..]), vec![SseEvent::Data("héllo".into())]);
    }

    #[test]
    fn test_finish_flushes_tail() {
        let mut buf = SseBuffer::new();
        buf.push(b"data: tail");
        assert_eq!(buf.finish(), Some(SseEvent::Data("tail".into())));
        assert_eq!(buf.finish(), None);
    }
}
