// src/chat.rs

use crate::{
    api::{AnswerSource, ChunkStream, StreamEnd, StreamEvent},
    config::Config,
    exchange::{Exchange, ExchangeHandle, ExchangeState},
    logging::log_exchange,
    markdown::MarkdownRenderer,
    models::{ExchangeLog, Message, RenderedMessage},
    panel::HostCancellation,
};
use chrono::Utc;
use std::sync::Arc;

struct ActiveStream {
    handle: ExchangeHandle,
    stream: ChunkStream,
}

/// The chat panel's client side: input control, scrollback, and one answer
/// stream per question, re-rendered as markdown on every chunk.
///
/// At most one exchange streams at a time. Submitting a new question cancels
/// the previous stream, which keeps whatever text it had received.
pub struct ChatClient {
    source: Arc<dyn AnswerSource>,
    renderer: MarkdownRenderer,
    cursor_glyph: String,
    scrollback: Vec<RenderedMessage>,
    input: String,
    exchanges: Vec<Exchange>,
    active: Option<ActiveStream>,
    cancellation: Option<HostCancellation>,
}

impl ChatClient {
    pub fn new(
        source: Arc<dyn AnswerSource>,
        renderer: MarkdownRenderer,
        cursor_glyph: impl Into<String>,
    ) -> Self {
        Self {
            source,
            renderer,
            cursor_glyph: cursor_glyph.into(),
            scrollback: Vec::new(),
            input: String::new(),
            exchanges: Vec::new(),
            active: None,
            cancellation: None,
        }
    }

    pub fn from_config(source: Arc<dyn AnswerSource>, config: &Config) -> Self {
        Self::new(
            source,
            MarkdownRenderer::from_config(config),
            config.cursor_glyph.clone(),
        )
    }

    /// Cancels the active stream when the host signals cancellation.
    pub fn with_cancellation(mut self, cancellation: HostCancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    pub fn scrollback(&self) -> &[RenderedMessage] {
        &self.scrollback
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn endpoint(&self) -> &str {
        self.source.endpoint()
    }

    pub fn cursor_glyph(&self) -> &str {
        &self.cursor_glyph
    }

    pub fn renderer(&self) -> &MarkdownRenderer {
        &self.renderer
    }

    pub fn stylesheet(&self) -> String {
        self.renderer.highlighter().stylesheet()
    }

    pub fn exchange(&self, handle: ExchangeHandle) -> Option<&Exchange> {
        self.exchange_index(handle).map(|idx| &self.exchanges[idx])
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn has_active_stream(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_handle(&self) -> Option<ExchangeHandle> {
        self.active.as_ref().map(|active| active.handle)
    }

    /// State of the newest exchange, `Idle` before the first question.
    pub fn current_state(&self) -> ExchangeState {
        self.exchanges
            .last()
            .map(Exchange::state)
            .unwrap_or(ExchangeState::Idle)
    }

    /// Submits whatever is in the input control.
    pub fn submit_input(&mut self) -> Option<ExchangeHandle> {
        let question = self.input.clone();
        self.submit(&question)
    }

    /// Starts a new exchange for `question`. Blank questions are ignored.
    ///
    /// The user message and the assistant placeholder are in the scrollback
    /// before the stream is opened; all further updates arrive through
    /// [`ChatClient::next_event`].
    pub fn submit(&mut self, question: &str) -> Option<ExchangeHandle> {
        let question = question.trim();
        if question.is_empty() {
            log::debug!("Ignoring empty question");
            return None;
        }
        if self
            .cancellation
            .as_ref()
            .is_some_and(HostCancellation::is_cancelled)
        {
            log::warn!("Panel has been disposed, ignoring question");
            return None;
        }

        self.push_message(Message::user(question));
        self.input.clear();
        let assistant_index = self.push_message(Message::assistant(self.cursor_glyph.clone()));

        if let Some(mut previous) = self.active.take() {
            log::info!(
                "Exchange #{} superseded by a new question",
                previous.handle.id()
            );
            previous.stream.cancel();
            self.on_stream_end(previous.handle, StreamEnd::Cancelled);
        }

        let handle = ExchangeHandle::new(self.exchanges.len() as u64 + 1, assistant_index);
        let mut exchange = Exchange::new(handle, question);
        let stream = self.source.open(question);
        exchange.begin();
        self.exchanges.push(exchange);
        self.active = Some(ActiveStream { handle, stream });

        log::debug!("Started exchange #{}", handle.id());
        Some(handle)
    }

    /// Applies one chunk of the answer for `handle`.
    pub fn on_chunk(&mut self, handle: ExchangeHandle, data: &str) -> bool {
        let Some(idx) = self.exchange_index(handle) else {
            return false;
        };
        let exchange = &mut self.exchanges[idx];
        if !exchange.push_chunk(data) {
            return false;
        }
        let text = exchange.in_progress_text(&self.cursor_glyph);
        self.update_message(handle.assistant_index(), text);
        true
    }

    /// Ends the exchange for `handle` and renders its final text. Calling it
    /// again for an exchange that already ended does nothing.
    pub fn on_stream_end(&mut self, handle: ExchangeHandle, end: StreamEnd) -> bool {
        let Some(idx) = self.exchange_index(handle) else {
            return false;
        };
        if !self.exchanges[idx].finish(&end) {
            return false;
        }

        if self.active_handle() == Some(handle) {
            if let Some(mut active) = self.active.take() {
                active.stream.cancel();
            }
        }

        let exchange = &self.exchanges[idx];
        let text = exchange.buffer().to_string();
        let outcome = match &end {
            StreamEnd::Completed => "completed".to_string(),
            StreamEnd::Failed(reason) => {
                log::warn!("Exchange #{} failed: {}", handle.id(), reason);
                format!("failed: {}", reason)
            }
            StreamEnd::Cancelled => "cancelled".to_string(),
        };
        log_exchange(&ExchangeLog {
            timestamp: Utc::now(),
            exchange_id: handle.id(),
            endpoint: self.source.endpoint().to_string(),
            question_chars: exchange.question().chars().count(),
            chunk_count: exchange.chunk_count(),
            answer_chars: text.chars().count(),
            outcome,
            elapsed_ms: exchange.elapsed_ms(),
        });

        self.update_message(handle.assistant_index(), text);
        true
    }

    pub fn apply(&mut self, handle: ExchangeHandle, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Chunk(data) => self.on_chunk(handle, &data),
            StreamEvent::End(end) => self.on_stream_end(handle, end),
        }
    }

    /// Waits for the next event of the active stream. Returns `None` when no
    /// stream is active.
    pub async fn next_event(&mut self) -> Option<(ExchangeHandle, StreamEvent)> {
        let active = self.active.as_mut()?;
        let handle = active.handle;

        let event = match self.cancellation.as_mut() {
            Some(cancellation) => tokio::select! {
                event = active.stream.recv() => event,
                _ = cancellation.cancelled() => {
                    log::info!("Host cancelled the panel, closing exchange #{}", handle.id());
                    active.stream.cancel();
                    Some(StreamEvent::End(StreamEnd::Cancelled))
                }
            },
            None => active.stream.recv().await,
        };

        let event = event.unwrap_or_else(|| {
            StreamEvent::End(StreamEnd::Failed(
                "stream closed before completing".to_string(),
            ))
        });
        Some((handle, event))
    }

    /// Applies one event from the active stream. Returns `false` once there
    /// is nothing left to wait for.
    pub async fn pump(&mut self) -> bool {
        match self.next_event().await {
            Some((handle, event)) => {
                self.apply(handle, event);
                true
            }
            None => false,
        }
    }

    /// Drives the active exchange until it ends.
    pub async fn run_active(&mut self) {
        while self.pump().await {}
    }

    pub fn cancel_active(&mut self) -> bool {
        let Some(mut active) = self.active.take() else {
            return false;
        };
        active.stream.cancel();
        self.on_stream_end(active.handle, StreamEnd::Cancelled)
    }

    fn exchange_index(&self, handle: ExchangeHandle) -> Option<usize> {
        let idx = usize::try_from(handle.id()).ok()?.checked_sub(1)?;
        self.exchanges
            .get(idx)
            .filter(|exchange| exchange.handle() == handle)
            .map(|_| idx)
    }

    fn push_message(&mut self, message: Message) -> usize {
        let html = self.renderer.render(&message.text);
        self.scrollback.push(RenderedMessage { message, html });
        self.scrollback.len() - 1
    }

    fn update_message(&mut self, index: usize, text: String) {
        let html = self.renderer.render(&text);
        if let Some(slot) = self.scrollback.get_mut(index) {
            slot.message.text = text;
            slot.html = html;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedSource;
    use crate::constants::CURSOR_GLYPH;
    use crate::models::Sender;
    use crate::panel::cancellation_pair;
    use regex::Regex;

    fn client() -> (Arc<ScriptedSource>, ChatClient) {
        let source = Arc::new(ScriptedSource::new());
        let client = ChatClient::new(source.clone(), MarkdownRenderer::default(), CURSOR_GLYPH);
        (source, client)
    }

    fn render(text: &str) -> String {
        MarkdownRenderer::default().render(text)
    }

    fn in_progress(text: &str) -> String {
        render(&format!("{} {}", text, CURSOR_GLYPH))
    }

    fn strip_tags(html: &str) -> String {
        Regex::new(r"<[^>]*>").unwrap().replace_all(html, "").to_string()
    }

    #[test]
    fn test_submit_appends_user_and_placeholder_before_streaming() {
        let (source, mut client) = client();
        client.input_mut().push_str("  2+2?  ");

        let handle = client.submit_input().unwrap();

        let scrollback = client.scrollback();
        assert_eq!(scrollback.len(), 2);
        assert_eq!(scrollback[0].message.sender, Sender::User);
        assert_eq!(scrollback[0].message.text, "2+2?");
        assert_eq!(scrollback[0].html, render("2+2?"));
        assert_eq!(scrollback[1].message.sender, Sender::Assistant);
        assert_eq!(scrollback[1].message.text, CURSOR_GLYPH);
        assert_eq!(scrollback[1].html, render(CURSOR_GLYPH));

        assert_eq!(client.input(), "");
        assert_eq!(source.opened(), vec!["2+2?".to_string()]);
        assert_eq!(handle.assistant_index(), 1);
        assert_eq!(
            client.exchange(handle).unwrap().state(),
            ExchangeState::AwaitingFirstChunk
        );
        assert!(client.has_active_stream());
    }

    #[test]
    fn test_blank_questions_do_nothing() {
        let (source, mut client) = client();
        assert!(client.submit("").is_none());
        assert!(client.submit("   \n\t").is_none());

        client.input_mut().push_str("   ");
        assert!(client.submit_input().is_none());
        assert_eq!(client.input(), "   ");

        assert!(client.scrollback().is_empty());
        assert!(source.opened().is_empty());
        assert!(!client.has_active_stream());
        assert_eq!(client.current_state(), ExchangeState::Idle);
    }

    #[test]
    fn test_render_tracks_every_chunk_prefix() {
        let (_source, mut client) = client();
        let handle = client.submit("explain").unwrap();
        let chunks = ["Some ", "*markdown* ", "with `code`", " and more."];

        let mut so_far = String::new();
        for chunk in chunks {
            assert!(client.on_chunk(handle, chunk));
            so_far.push_str(chunk);
            assert_eq!(client.scrollback()[1].html, in_progress(&so_far));
            assert_eq!(client.exchange(handle).unwrap().state(), ExchangeState::Streaming);
        }

        assert!(client.on_stream_end(handle, StreamEnd::Completed));
        assert_eq!(client.scrollback()[1].html, render(&so_far));
        assert_eq!(client.scrollback()[1].message.text, so_far);
        assert_eq!(client.exchange(handle).unwrap().state(), ExchangeState::Done);
        assert!(!client.has_active_stream());
    }

    #[test]
    fn test_scenario_single_chunk_answer() {
        let (_source, mut client) = client();
        let handle = client.submit("2+2?").unwrap();
        client.on_chunk(handle, "4");
        client.on_stream_end(handle, StreamEnd::Completed);

        assert_eq!(client.scrollback()[0].html, "<p>2+2?</p>\n");
        assert_eq!(client.scrollback()[1].html, "<p>4</p>\n");
    }

    #[test]
    fn test_scenario_streamed_code_block_is_highlighted() {
        let (_source, mut client) = client();
        let handle = client.submit("show code").unwrap();
        for chunk in ["```py\n", "print(1)", "\n```"] {
            client.on_chunk(handle, chunk);
        }
        client.on_stream_end(handle, StreamEnd::Completed);

        let html = &client.scrollback()[1].html;
        assert!(html.starts_with("<pre class=\"hljs\"><code class=\"language-py\">"));
        assert!(strip_tags(html).contains("print(1)"));
        assert!(!html.contains(CURSOR_GLYPH));
    }

    #[test]
    fn test_scenario_error_keeps_partial_text_without_banner() {
        let (_source, mut client) = client();
        let handle = client.submit("greet").unwrap();
        client.on_chunk(handle, "Hel");
        client.on_chunk(handle, "lo");
        client.on_stream_end(handle, StreamEnd::Failed("connection reset".to_string()));

        let html = &client.scrollback()[1].html;
        assert_eq!(html, "<p>Hello</p>\n");
        assert!(!html.to_lowercase().contains("error"));
        assert_eq!(client.exchange(handle).unwrap().state(), ExchangeState::Errored);
    }

    #[test]
    fn test_end_handler_is_idempotent() {
        let (source, mut client) = client();
        let handle = client.submit("q").unwrap();
        client.on_chunk(handle, "answer");
        assert!(client.on_stream_end(handle, StreamEnd::Completed));
        let before = client.scrollback().to_vec();

        assert!(!client.on_stream_end(handle, StreamEnd::Completed));
        assert!(!client.on_stream_end(handle, StreamEnd::Failed("late".to_string())));
        assert!(!client.on_chunk(handle, "more"));

        assert_eq!(client.scrollback(), before.as_slice());
        assert_eq!(source.opened().len(), 1);
        assert!(!client.has_active_stream());
        assert_eq!(client.exchange(handle).unwrap().state(), ExchangeState::Done);
    }

    #[test]
    fn test_empty_chunks_are_ignored() {
        let (_source, mut client) = client();
        let handle = client.submit("q").unwrap();
        assert!(!client.on_chunk(handle, ""));
        assert_eq!(client.scrollback()[1].message.text, CURSOR_GLYPH);
        assert_eq!(
            client.exchange(handle).unwrap().state(),
            ExchangeState::AwaitingFirstChunk
        );
    }

    #[test]
    fn test_new_question_supersedes_active_stream() {
        let (source, mut client) = client();
        let first = client.submit("first").unwrap();
        client.on_chunk(first, "partial");

        let second = client.submit("second").unwrap();

        assert_eq!(client.exchange(first).unwrap().state(), ExchangeState::Errored);
        assert_eq!(client.scrollback()[1].html, render("partial"));
        assert_eq!(client.active_handle(), Some(second));
        assert_eq!(second.assistant_index(), 3);
        assert_eq!(client.scrollback().len(), 4);
        assert_eq!(source.opened(), vec!["first".to_string(), "second".to_string()]);

        // Late chunks for the superseded exchange are dropped.
        assert!(!client.on_chunk(first, " more"));
        assert_eq!(client.scrollback()[1].message.text, "partial");
    }

    #[test]
    fn test_foreign_handles_are_rejected() {
        let (_source, mut client) = client();
        let handle = client.submit("q").unwrap();
        let bogus = ExchangeHandle::new(handle.id(), 0);
        assert!(!client.on_chunk(bogus, "x"));
        assert!(!client.on_stream_end(ExchangeHandle::new(9, 1), StreamEnd::Completed));
    }

    #[tokio::test]
    async fn test_events_are_applied_in_delivery_order() {
        let (source, mut client) = client();
        let handle = client.submit("greet").unwrap();

        let tx = source.sender(0);
        for chunk in ["Hel", "", "lo", ", ", "world"] {
            tx.send(StreamEvent::Chunk(chunk.to_string())).unwrap();
        }
        tx.send(StreamEvent::End(StreamEnd::Completed)).unwrap();

        client.run_active().await;

        let exchange = client.exchange(handle).unwrap();
        assert_eq!(exchange.state(), ExchangeState::Done);
        assert_eq!(exchange.buffer(), "Hello, world");
        assert_eq!(exchange.chunk_count(), 4);
        assert_eq!(client.scrollback()[1].html, render("Hello, world"));
        assert!(!client.pump().await);
    }

    #[tokio::test]
    async fn test_stream_closed_without_end_is_an_error() {
        let (source, mut client) = client();
        let handle = client.submit("q").unwrap();

        source.sender(0).send(StreamEvent::Chunk("Hel".to_string())).unwrap();
        source.close(0);

        client.run_active().await;

        assert_eq!(client.exchange(handle).unwrap().state(), ExchangeState::Errored);
        assert_eq!(client.scrollback()[1].html, render("Hel"));
    }

    #[tokio::test]
    async fn test_next_event_without_stream_is_none() {
        let (_source, mut client) = client();
        assert!(client.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_host_cancellation_closes_the_stream() {
        let (source, client) = client();
        let (host, cancellation) = cancellation_pair();
        let mut client = client.with_cancellation(cancellation);

        let handle = client.submit("long answer").unwrap();
        source.sender(0).send(StreamEvent::Chunk("Par".to_string())).unwrap();
        assert!(client.pump().await);

        host.cancel();
        client.run_active().await;

        assert_eq!(client.exchange(handle).unwrap().state(), ExchangeState::Errored);
        assert_eq!(client.scrollback()[1].html, render("Par"));
        assert!(source.sender(0).is_closed());

        assert!(client.submit("another").is_none());
        assert_eq!(source.opened().len(), 1);
    }

    #[test]
    fn test_cancel_active() {
        let (_source, mut client) = client();
        assert!(!client.cancel_active());

        let handle = client.submit("q").unwrap();
        client.on_chunk(handle, "so far");
        assert!(client.cancel_active());
        assert_eq!(client.exchange(handle).unwrap().state(), ExchangeState::Errored);
        assert_eq!(client.scrollback()[1].message.text, "so far");
        assert!(!client.has_active_stream());
    }
}
