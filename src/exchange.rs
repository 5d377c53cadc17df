// src/exchange.rs

use crate::api::StreamEnd;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    AwaitingFirstChunk,
    Streaming,
    Done,
    Errored,
}

impl ExchangeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExchangeState::Done | ExchangeState::Errored)
    }

    pub fn is_live(self) -> bool {
        matches!(
            self,
            ExchangeState::AwaitingFirstChunk | ExchangeState::Streaming
        )
    }
}

/// Identifies one question/answer exchange. Returned by `submit` and passed
/// back with every chunk and end event for that exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeHandle {
    id: u64,
    assistant_index: usize,
}

impl ExchangeHandle {
    pub(crate) fn new(id: u64, assistant_index: usize) -> Self {
        Self {
            id,
            assistant_index,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Scrollback position of the assistant message this exchange writes to.
    pub fn assistant_index(&self) -> usize {
        self.assistant_index
    }
}

#[derive(Debug)]
pub struct Exchange {
    handle: ExchangeHandle,
    question: String,
    state: ExchangeState,
    buffer: String,
    chunk_count: usize,
    started: Instant,
}

impl Exchange {
    pub fn new(handle: ExchangeHandle, question: impl Into<String>) -> Self {
        Self {
            handle,
            question: question.into(),
            state: ExchangeState::Idle,
            buffer: String::new(),
            chunk_count: 0,
            started: Instant::now(),
        }
    }

    pub fn handle(&self) -> ExchangeHandle {
        self.handle
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Everything received so far, in arrival order.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    /// Idle -> AwaitingFirstChunk, once the stream has been opened.
    pub fn begin(&mut self) -> bool {
        if self.state != ExchangeState::Idle {
            return false;
        }
        self.state = ExchangeState::AwaitingFirstChunk;
        self.started = Instant::now();
        true
    }

    /// Appends a chunk. Empty chunks and chunks for an exchange that is not
    /// live are dropped.
    pub fn push_chunk(&mut self, data: &str) -> bool {
        if data.is_empty() || !self.state.is_live() {
            return false;
        }
        self.buffer.push_str(data);
        self.chunk_count += 1;
        self.state = ExchangeState::Streaming;
        true
    }

    /// Moves a live exchange to its terminal state. Returns `false` if the
    /// exchange already ended or never started.
    pub fn finish(&mut self, end: &StreamEnd) -> bool {
        if !self.state.is_live() {
            return false;
        }
        self.state = match end {
            StreamEnd::Completed => ExchangeState::Done,
            StreamEnd::Failed(_) | StreamEnd::Cancelled => ExchangeState::Errored,
        };
        true
    }

    /// Markdown shown while the answer is still arriving.
    pub fn in_progress_text(&self, cursor_glyph: &str) -> String {
        if self.buffer.is_empty() {
            return cursor_glyph.to_string();
        }
        format!("{} {}", self.buffer, cursor_glyph)
    }
}
