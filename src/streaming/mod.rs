//! Streaming output assembly
//!
//! A backend response arrives as a [`ChunkSource`]. The [`OutputCoordinator`]
//! drives it through the [`StreamProcessor`] into a bounded
//! [`ResponseAssembler`], closes the source early when the ceiling or the
//! context limit is reached, and renders the result with the
//! [`FormatTransformer`].

pub mod assembler;
pub mod coordinator;
pub mod format;
pub mod processor;
pub mod source;
pub mod truncation;

pub use assembler::{DEFAULT_MAX_BUFFER_BYTES, ResponseAssembler};
pub use coordinator::{AssembledOutput, OutputCoordinator, OutputOptions};
pub use format::{FormatTransformer, OutputFormat, Payload};
pub use processor::{ChunkControl, StreamProcessor, StreamSummary};
pub use source::{
    ChannelSource, ChunkSender, ChunkSource, SourceClosed, StreamChunk, StreamError, StreamSource,
};
pub use truncation::{
    ContextLimits, ContextTruncation, ContextType, DEFAULT_ANALYSIS_LIMIT_BYTES,
    DEFAULT_CHAT_LIMIT_BYTES, DEFAULT_CODE_LIMIT_BYTES, TruncationManager, TruncationStep,
};
