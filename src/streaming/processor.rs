//! Incremental stream consumption
//!
//! Drives a [`ChunkSource`] to completion in arrival order. Each chunk goes
//! to the caller's callback, or is published on a broadcast channel when no
//! callback is given.

use crate::streaming::source::{ChunkSource, StreamChunk, StreamError};
use tokio::sync::broadcast;

/// Capacity of the chunk event channel
const EVENT_CAPACITY: usize = 256;

/// Callback verdict after seeing a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkControl {
    Continue,
    /// Close the source; remaining buffered chunks are discarded
    Stop,
}

/// What happened while a source was consumed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Chunks delivered to the consumer
    pub chunks: usize,
    pub bytes: usize,
    /// The consumer stopped the source before it ended
    pub cancelled: bool,
}

/// Consumes chunk sources
#[derive(Debug)]
pub struct StreamProcessor {
    events: broadcast::Sender<StreamChunk>,
}

impl Default for StreamProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamProcessor {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { events }
    }

    /// Receive chunks processed without a callback
    pub fn subscribe(&self) -> broadcast::Receiver<StreamChunk> {
        self.events.subscribe()
    }

    /// Consume `source` until it ends
    ///
    /// When the callback answers [`ChunkControl::Stop`] the source is closed.
    /// The `Destroyed` signal that follows is the expected outcome of that
    /// close and resolves the call successfully; any other source error is
    /// returned unchanged.
    pub async fn process<S>(
        &self,
        source: &mut S,
        mut on_chunk: Option<&mut (dyn FnMut(&StreamChunk) -> ChunkControl + Send)>,
    ) -> Result<StreamSummary, StreamError>
    where
        S: ChunkSource + ?Sized,
    {
        let mut summary = StreamSummary::default();

        while let Some(item) = source.next_chunk().await {
            match item {
                Ok(chunk) => {
                    if summary.cancelled {
                        continue;
                    }
                    summary.chunks += 1;
                    summary.bytes += chunk.len_bytes();

                    let control = match on_chunk.as_deref_mut() {
                        Some(callback) => callback(&chunk),
                        None => {
                            // No subscribers is not an error
                            let _ = self.events.send(chunk);
                            ChunkControl::Continue
                        }
                    };

                    if control == ChunkControl::Stop {
                        tracing::debug!(
                            chunks = summary.chunks,
                            bytes = summary.bytes,
                            "Consumer requested stop, closing source"
                        );
                        source.close();
                        summary.cancelled = true;
                    }
                }
                Err(StreamError::Destroyed) if summary.cancelled => {
                    tracing::debug!("Source settled after cooperative cancellation");
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        chunks = summary.chunks,
                        bytes = summary.bytes,
                        "Stream source failed"
                    );
                    return Err(e);
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::source::{ChannelSource, StreamSource};

    #[tokio::test]
    async fn test_callback_sees_chunks_in_order() {
        let processor = StreamProcessor::new();
        let mut source = StreamSource::from_chunks(["one ", "two ", "three"]);
        let mut seen = Vec::new();
        let mut callback = |chunk: &StreamChunk| {
            seen.push(chunk.text().to_string());
            ChunkControl::Continue
        };

        let summary = processor
            .process(&mut source, Some(&mut callback))
            .await
            .unwrap();

        assert_eq!(seen, vec!["one ", "two ", "three"]);
        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.bytes, 13);
        assert!(!summary.cancelled);
    }

    #[tokio::test]
    async fn test_stop_closes_source_and_swallows_destroyed() {
        let processor = StreamProcessor::new();
        let (tx, mut source) = ChannelSource::channel(16);
        for i in 0..5 {
            tx.send(format!("chunk-{}", i)).await.unwrap();
        }

        let mut count = 0;
        let mut callback = |_: &StreamChunk| {
            count += 1;
            if count == 2 {
                ChunkControl::Stop
            } else {
                ChunkControl::Continue
            }
        };

        let summary = processor
            .process(&mut source, Some(&mut callback))
            .await
            .expect("cancellation must not surface as an error");

        assert_eq!(count, 2);
        assert_eq!(summary.chunks, 2);
        assert!(summary.cancelled);
        assert!(tx.is_closed(), "producer observes the close");
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let processor = StreamProcessor::new();
        let (tx, mut source) = ChannelSource::channel(4);
        tx.send("partial").await.unwrap();
        tx.fail("upstream 502").await.unwrap();
        drop(tx);

        let err = processor.process(&mut source, None).await.unwrap_err();
        assert_eq!(err, StreamError::Source("upstream 502".to_string()));
    }

    #[tokio::test]
    async fn test_unexpected_destroyed_is_an_error() {
        let processor = StreamProcessor::new();
        let stream = futures::stream::iter(vec![Err(StreamError::Destroyed)]);
        let mut source = StreamSource::from_stream(stream);

        let err = processor.process(&mut source, None).await.unwrap_err();
        assert_eq!(err, StreamError::Destroyed);
    }

    #[tokio::test]
    async fn test_without_callback_chunks_are_published() {
        let processor = StreamProcessor::new();
        let mut events = processor.subscribe();
        let mut source = StreamSource::from_chunks(["a", "b"]);

        processor.process(&mut source, None).await.unwrap();

        assert_eq!(events.recv().await.unwrap().text(), "a");
        assert_eq!(events.recv().await.unwrap().text(), "b");
    }
}
