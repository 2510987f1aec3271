//! Chunk sources
//!
//! A [`ChunkSource`] yields text chunks in arrival order and supports a
//! cooperative close. After `close()` the source reports
//! [`StreamError::Destroyed`] exactly once and then ends; that terminal
//! signal is distinct from a real producer failure (`StreamError::Source`).

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;

/// One unit of streamed text
///
/// Carries no ordering metadata: arrival order is delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk(String);

impl StreamChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }

    /// UTF-8 byte length
    pub fn len_bytes(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_text(self) -> String {
        self.0
    }
}

impl From<&str> for StreamChunk {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl From<String> for StreamChunk {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// Terminal conditions of a chunk source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The consumer closed the source; expected on early stop
    #[error("stream destroyed by consumer")]
    Destroyed,

    /// The producer failed
    #[error("stream source failed: {0}")]
    Source(String),
}

/// Returned to a producer whose consumer has closed the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("consumer closed the stream")]
pub struct SourceClosed;

/// Asynchronous, cooperatively cancellable chunk producer
#[async_trait]
pub trait ChunkSource: Send {
    /// Next item, or `None` once the source has ended
    async fn next_chunk(&mut self) -> Option<Result<StreamChunk, StreamError>>;

    /// Ask the producer to stop; must not fail
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceState {
    Open,
    Closing,
    Finished,
}

/// Channel-backed source paired with a [`ChunkSender`]
///
/// Dropping every sender is the end-of-stream signal.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Result<StreamChunk, StreamError>>,
    state: SourceState,
}

/// Producer half of a [`ChannelSource`]
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: mpsc::Sender<Result<StreamChunk, StreamError>>,
}

impl ChannelSource {
    /// Create a bounded channel; `capacity` is clamped to at least 1
    pub fn channel(capacity: usize) -> (ChunkSender, ChannelSource) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            ChunkSender { tx },
            ChannelSource {
                rx,
                state: SourceState::Open,
            },
        )
    }
}

#[async_trait]
impl ChunkSource for ChannelSource {
    async fn next_chunk(&mut self) -> Option<Result<StreamChunk, StreamError>> {
        match self.state {
            SourceState::Finished => None,
            SourceState::Closing => {
                self.state = SourceState::Finished;
                Some(Err(StreamError::Destroyed))
            }
            SourceState::Open => match self.rx.recv().await {
                Some(item) => Some(item),
                None => {
                    self.state = SourceState::Finished;
                    None
                }
            },
        }
    }

    fn close(&mut self) {
        if self.state == SourceState::Open {
            self.rx.close();
            self.state = SourceState::Closing;
        }
    }

    fn is_closed(&self) -> bool {
        self.state != SourceState::Open
    }
}

impl ChunkSender {
    /// Send a chunk; fails once the consumer has closed the stream
    pub async fn send(&self, chunk: impl Into<StreamChunk>) -> Result<(), SourceClosed> {
        self.tx.send(Ok(chunk.into())).await.map_err(|_| SourceClosed)
    }

    /// Report a producer failure to the consumer
    pub async fn fail(&self, reason: impl Into<String>) -> Result<(), SourceClosed> {
        self.tx
            .send(Err(StreamError::Source(reason.into())))
            .await
            .map_err(|_| SourceClosed)
    }

    /// Whether the consumer has stopped listening
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Adapter turning any `futures::Stream` of chunks into a [`ChunkSource`]
///
/// Closing drops the inner stream, which releases whatever the producer held.
pub struct StreamSource {
    inner: Option<BoxStream<'static, Result<StreamChunk, StreamError>>>,
    state: SourceState,
}

impl StreamSource {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<StreamChunk, StreamError>> + Send + 'static,
    {
        Self {
            inner: Some(stream.boxed()),
            state: SourceState::Open,
        }
    }

    /// Source over a fixed list of chunks
    pub fn from_chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<StreamChunk>,
    {
        let items: Vec<Result<StreamChunk, StreamError>> =
            chunks.into_iter().map(|c| Ok(c.into())).collect();
        Self::from_stream(futures::stream::iter(items))
    }
}

impl std::fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSource")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChunkSource for StreamSource {
    async fn next_chunk(&mut self) -> Option<Result<StreamChunk, StreamError>> {
        match self.state {
            SourceState::Finished => None,
            SourceState::Closing => {
                self.state = SourceState::Finished;
                Some(Err(StreamError::Destroyed))
            }
            SourceState::Open => {
                let item = match self.inner.as_mut() {
                    Some(stream) => stream.next().await,
                    None => None,
                };
                if item.is_none() {
                    self.state = SourceState::Finished;
                    self.inner = None;
                }
                item
            }
        }
    }

    fn close(&mut self) {
        if self.state == SourceState::Open {
            self.inner = None;
            self.state = SourceState::Closing;
        }
    }

    fn is_closed(&self) -> bool {
        self.state != SourceState::Open
    }
}
