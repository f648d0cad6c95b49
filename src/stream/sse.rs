/// One server-sent-event frame as dispatched by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// Value of the `event:` field, if the frame carried one
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
            id: None,
        }
    }

    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
            id: None,
        }
    }
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes are fed in arbitrary chunks; complete frames are returned as soon as
/// their terminating blank line has been seen. Partial lines are buffered as
/// raw bytes so multi-byte characters split across chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    has_data: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every frame it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }

        // Comment lines carry keep-alives only
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data.push(value.to_string());
                self.has_data = true;
            }
            "id" => self.id = Some(value.to_string()),
            // `retry` and unknown fields do not affect dispatch
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let id = self.id.take();
        if !self.has_data {
            self.data.clear();
            return None;
        }

        self.has_data = false;
        let data = std::mem::take(&mut self.data).join("\n");

        Some(SseEvent { event, data, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_single_message() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"status\":\"running\"}\n\n");

        assert_eq!(events, vec![SseEvent::message("{\"status\":\"running\"}")]);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.feed(b"event: progr").is_empty());
        assert!(decoder.feed(b"ess\ndata: 4").is_empty());
        let events = decoder.feed(b"2\n\n");

        assert_eq!(events, vec![SseEvent::named("progress", "42")]);
    }

    #[test]
    fn test_crlf_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: first\r\ndata: second\r\n\r\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "first\nsecond");
    }

    #[test]
    fn test_comments_and_empty_frames_are_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keep-alive\n\nevent: ping\n\ndata: x\n\n");

        // The `ping` frame has no data, so only the last frame is dispatched
        assert_eq!(events, vec![SseEvent::message("x")]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: caf\u{e9}\n\n".as_bytes();
        let split = bytes.len() - 3;

        assert!(decoder.feed(&bytes[..split]).is_empty());
        let events = decoder.feed(&bytes[split..]);

        assert_eq!(events[0].data, "caf\u{e9}");
    }

    #[test]
    fn test_id_field_is_kept() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"id: 7\ndata:no-space\n\n");

        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[0].data, "no-space");
    }
}
