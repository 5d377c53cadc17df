use crate::{
    config::Config,
    constants::QUESTION_PARAM,
    errors::{PanelError, PanelResult},
    sse::SseDecoder,
};
use futures::{Stream, StreamExt};
use reqwest::{header, Client, Url};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::{sync::mpsc, task::JoinHandle};

/// How a stream of answer chunks ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    Completed,
    Failed(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    End(StreamEnd),
}

/// A finite, cancellable sequence of answer chunks followed by one `End`.
///
/// Events are produced by a background task and delivered in order over a
/// channel. Dropping the stream cancels the producer.
#[derive(Debug)]
pub struct ChunkStream {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    task: Option<JoinHandle<()>>,
}

impl ChunkStream {
    /// Runs `producer` on the tokio runtime, handing it the sending half.
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(mpsc::UnboundedSender<StreamEvent>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(producer(tx));
        Self {
            rx,
            task: Some(task),
        }
    }

    /// A stream fed by hand through the returned sender.
    pub fn channel() -> (mpsc::UnboundedSender<StreamEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx, task: None })
    }

    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Stops the producer and closes the channel. Events already queued can
    /// still be drained.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.rx.close();
    }
}

impl Stream for ChunkStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Something that can answer a question as a stream of chunks.
pub trait AnswerSource: Send + Sync {
    fn open(&self, question: &str) -> ChunkStream;

    /// Where answers come from, for logs.
    fn endpoint(&self) -> &str;
}

/// Client for the local assistant service's `GET /ask?question=...`
/// server-sent-event endpoint.
#[derive(Debug, Clone)]
pub struct AskClient {
    client: Client,
    endpoint: Url,
    endpoint_str: String,
}

impl AskClient {
    pub fn new(endpoint: &str) -> PanelResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| PanelError::endpoint_error(format!("{}: {}", endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(PanelError::endpoint_error(format!(
                "unsupported scheme '{}'",
                endpoint.scheme()
            )));
        }

        Ok(Self {
            client: Client::new(),
            endpoint_str: endpoint.to_string(),
            endpoint,
        })
    }

    pub fn from_config(config: &Config) -> PanelResult<Self> {
        Self::new(&config.endpoint)
    }

    /// The request URL for `question`, with the question form-encoded.
    pub fn question_url(&self, question: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair(QUESTION_PARAM, question);
        url
    }
}

impl AnswerSource for AskClient {
    fn open(&self, question: &str) -> ChunkStream {
        let client = self.client.clone();
        let url = self.question_url(question);
        log::info!("Opening answer stream: {}", url);
        ChunkStream::spawn(move |tx| stream_answer(client, url, tx))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint_str
    }
}

async fn stream_answer(client: Client, url: Url, tx: mpsc::UnboundedSender<StreamEvent>) {
    let end = match read_answer(&client, url, &tx).await {
        Ok(()) => StreamEnd::Completed,
        Err(e) => {
            log::warn!("Answer stream failed: {}", e);
            StreamEnd::Failed(e.to_string())
        }
    };
    // The receiver may already be gone; nothing left to tell it then.
    let _ = tx.send(StreamEvent::End(end));
}

async fn read_answer(
    client: &Client,
    url: Url,
    tx: &mpsc::UnboundedSender<StreamEvent>,
) -> PanelResult<()> {
    let response = client
        .get(url)
        .header(header::ACCEPT, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(PanelError::Protocol(format!("service returned {}", status)));
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with("text/event-stream") {
        return Err(PanelError::Protocol(format!(
            "expected text/event-stream, got '{}'",
            content_type
        )));
    }

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();
    while let Some(packet) = body.next().await {
        let packet = packet?;
        for event in decoder.feed(&packet) {
            if !event.is_message() {
                log::debug!("Skipping '{}' event", event.event.as_deref().unwrap_or_default());
                continue;
            }
            if tx.send(StreamEvent::Chunk(event.data)).is_err() {
                log::debug!("Answer stream receiver dropped, stopping read");
                return Ok(());
            }
        }
    }
    decoder.finish();

    Ok(())
}
