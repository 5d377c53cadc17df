// src/sse.rs

//! Incremental `text/event-stream` decoding.
//!
//! Bytes arrive in arbitrary packets; [`SseDecoder::feed`] buffers partial
//! lines and returns every event completed by the new bytes.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    /// Events without an `event:` field, or with `event: message`, are the
    /// ones an EventSource `onmessage` handler sees.
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    data: String,
    has_data: bool,
    event: Option<String>,
    // A CR ended the previous packet; swallow a leading LF in the next one.
    pending_cr: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();

        for &byte in bytes {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }

            match byte {
                b'\n' => self.end_line(&mut events),
                b'\r' => {
                    self.pending_cr = true;
                    self.end_line(&mut events);
                }
                other => self.line.push(other),
            }
        }

        events
    }

    /// Ends the stream. An event that was never terminated by a blank line
    /// is dropped.
    pub fn finish(&mut self) {
        if self.has_data || !self.line.is_empty() {
            log::debug!("Discarding unterminated event at end of stream");
        }
        self.line.clear();
        self.reset_event();
        self.pending_cr = false;
    }

    fn end_line(&mut self, events: &mut Vec<SseEvent>) {
        let raw = std::mem::take(&mut self.line);
        let line = String::from_utf8_lossy(&raw);

        if line.is_empty() {
            if let Some(event) = self.dispatch() {
                events.push(event);
            }
            return;
        }

        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (&line[..], ""),
        };

        match field {
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.event = Some(value.to_string()),
            // Nothing reconnects, so ids and retry hints have no use.
            "id" | "retry" => {}
            other => log::trace!("Ignoring unknown SSE field '{}'", other),
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if !self.has_data {
            self.reset_event();
            return None;
        }

        let event = SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data),
        };
        self.reset_event();
        Some(event)
    }

    fn reset_event(&mut self) {
        self.data.clear();
        self.has_data = false;
        self.event = None;
    }
}
