//! Stream → assembler → formatter pipeline
//!
//! Each call owns a fresh [`ResponseAssembler`]. When the assembler refuses
//! a chunk the source is closed cooperatively and the call still succeeds
//! with the text gathered so far.

use crate::error::AppResult;
use crate::metrics::Metrics;
use crate::streaming::assembler::{DEFAULT_MAX_BUFFER_BYTES, ResponseAssembler};
use crate::streaming::format::{FormatTransformer, OutputFormat, Payload};
use crate::streaming::processor::{ChunkControl, StreamProcessor};
use crate::streaming::source::{ChunkSource, StreamChunk};
use crate::streaming::truncation::{ContextLimits, ContextType};
use serde::Serialize;
use std::sync::Arc;

/// Per-call output settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputOptions {
    pub context_type: ContextType,
    /// `None` leaves the assembled text unformatted
    pub format: Option<OutputFormat>,
}

impl OutputOptions {
    pub fn new(context_type: ContextType) -> Self {
        Self {
            context_type,
            format: None,
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }
}

/// Result of one coordinated stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledOutput {
    /// Accepted text, in arrival order
    pub text: String,
    /// `text` after formatting (equal to `text` when no format was requested)
    pub rendered: String,
    pub truncated: bool,
    pub size_bytes: usize,
    /// Chunks received from the source
    pub chunks: usize,
    /// The source was closed before it finished
    pub cancelled: bool,
}

pub struct OutputCoordinator {
    max_buffer: usize,
    context_limits: ContextLimits,
    formatter: FormatTransformer,
    metrics: Option<Arc<Metrics>>,
}

impl Default for OutputCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER_BYTES)
    }
}

impl std::fmt::Debug for OutputCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputCoordinator")
            .field("max_buffer", &self.max_buffer)
            .field("context_limits", &self.context_limits)
            .finish_non_exhaustive()
    }
}

impl OutputCoordinator {
    pub fn new(max_buffer: usize) -> Self {
        Self {
            max_buffer,
            context_limits: ContextLimits::default(),
            formatter: FormatTransformer::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Per-context limits applied below `max_buffer`
    pub fn with_context_limits(mut self, limits: ContextLimits) -> Self {
        self.context_limits = limits;
        self
    }

    pub fn max_buffer(&self) -> usize {
        self.max_buffer
    }

    pub fn context_limits(&self) -> &ContextLimits {
        &self.context_limits
    }

    /// Consume `source` into a bounded, optionally formatted response
    ///
    /// `observer` sees every raw chunk the processor delivers, including the
    /// one that triggered truncation.
    pub async fn process<S>(
        &self,
        source: &mut S,
        options: &OutputOptions,
        mut observer: Option<&mut (dyn FnMut(&StreamChunk) + Send)>,
    ) -> AppResult<AssembledOutput>
    where
        S: ChunkSource + ?Sized,
    {
        let mut assembler = ResponseAssembler::with_limits(
            options.context_type,
            &self.context_limits,
            self.max_buffer,
        );
        let processor = StreamProcessor::new();

        let summary = {
            let mut on_chunk = |chunk: &StreamChunk| {
                let keep_going = assembler.add_chunk(chunk);
                if let Some(observe) = observer.as_deref_mut() {
                    observe(chunk);
                }
                if keep_going {
                    ChunkControl::Continue
                } else {
                    ChunkControl::Stop
                }
            };
            processor.process(source, Some(&mut on_chunk)).await?
        };

        let truncated = assembler.is_truncated();
        if truncated {
            tracing::debug!(
                context_type = %options.context_type,
                size_bytes = assembler.size_bytes(),
                "Stream output truncated"
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_truncation(options.context_type);
            }
        }

        let text = assembler.get_response();
        let rendered = match options.format {
            Some(format) => self.render(format, &text)?,
            None => text.clone(),
        };

        Ok(AssembledOutput {
            size_bytes: assembler.size_bytes(),
            text,
            rendered,
            truncated,
            chunks: summary.chunks,
            cancelled: summary.cancelled,
        })
    }

    /// JSON text is rendered structurally; anything else is rendered as a
    /// JSON string value, so Markdown fences it rather than passing it raw.
    fn render(&self, format: OutputFormat, text: &str) -> AppResult<String> {
        let payload = match serde_json::from_str(text) {
            Ok(value) => Payload::Structured(value),
            Err(_) => Payload::Structured(serde_json::Value::String(text.to_string())),
        };
        self.formatter.to(format, &payload)
    }
}
