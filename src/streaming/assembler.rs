//! Bounded response assembly
//!
//! Concatenates accepted chunk text in arrival order. The hard ceiling is
//! `max_buffer` bytes: text that would cross it is clipped on a UTF-8
//! boundary and the response is marked truncated. Once truncated, nothing
//! further is accepted.

use crate::streaming::source::StreamChunk;
use crate::streaming::truncation::{
    ContextLimits, ContextType, TruncationManager, floor_char_boundary,
};

/// Default ceiling on assembled response size (1 MiB)
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 1024 * 1024;

pub struct ResponseAssembler {
    parts: Vec<String>,
    size_bytes: usize,
    truncated: bool,
    max_buffer: usize,
    truncation: Box<dyn TruncationManager>,
}

impl std::fmt::Debug for ResponseAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseAssembler")
            .field("parts", &self.parts.len())
            .field("size_bytes", &self.size_bytes)
            .field("truncated", &self.truncated)
            .field("max_buffer", &self.max_buffer)
            .finish_non_exhaustive()
    }
}

impl ResponseAssembler {
    pub fn new(max_buffer: usize, truncation: Box<dyn TruncationManager>) -> Self {
        Self {
            parts: Vec::new(),
            size_bytes: 0,
            truncated: false,
            max_buffer,
            truncation,
        }
    }

    /// Assembler bounded only by `max_buffer`, cutting the way `context_type` does
    pub fn for_context(context_type: ContextType, max_buffer: usize) -> Self {
        Self::with_limits(context_type, &ContextLimits::default(), max_buffer)
    }

    /// Assembler applying the configured limit for `context_type`, if any
    pub fn with_limits(
        context_type: ContextType,
        limits: &ContextLimits,
        max_buffer: usize,
    ) -> Self {
        Self::new(max_buffer, Box::new(limits.truncation_for(context_type, max_buffer)))
    }

    /// Offer a chunk; returns whether more chunks should follow
    ///
    /// Returns false without touching state when the buffer is already full
    /// or truncated.
    pub fn add_chunk(&mut self, chunk: &StreamChunk) -> bool {
        if self.truncated || self.size_bytes >= self.max_buffer {
            return false;
        }

        let step = self.truncation.append(chunk.text());
        let mut text = step.text;

        let remaining = self.max_buffer - self.size_bytes;
        if text.len() > remaining {
            let cut = floor_char_boundary(&text, remaining);
            text.truncate(cut);
            self.truncated = true;
        }
        if step.done {
            self.truncated = true;
        }

        if !text.is_empty() {
            self.size_bytes += text.len();
            self.parts.push(text);
        }

        if self.size_bytes >= self.max_buffer {
            self.truncated = true;
        }

        if self.truncated {
            tracing::debug!(
                size_bytes = self.size_bytes,
                max_buffer = self.max_buffer,
                "Response truncated"
            );
        }

        !self.truncated
    }

    /// All accepted text, in arrival order
    pub fn get_response(&self) -> String {
        self.parts.concat()
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn max_buffer(&self) -> usize {
        self.max_buffer
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::truncation::ContextTruncation;

    fn assembler(max_buffer: usize) -> ResponseAssembler {
        ResponseAssembler::for_context(ContextType::Analysis, max_buffer)
    }

    #[test]
    fn test_accumulates_in_order() {
        let mut a = assembler(1024);
        assert!(a.add_chunk(&StreamChunk::from("Hello, ")));
        assert!(a.add_chunk(&StreamChunk::from("world")));
        assert_eq!(a.get_response(), "Hello, world");
        assert_eq!(a.size_bytes(), 12);
        assert!(!a.is_truncated());
    }

    #[test]
    fn test_ceiling_clips_and_truncates() {
        let mut a = assembler(10);
        assert!(a.add_chunk(&StreamChunk::from("abcdef")));
        assert!(!a.add_chunk(&StreamChunk::from("ghijkl")));
        assert!(a.is_truncated());
        assert_eq!(a.size_bytes(), 10);
        assert_eq!(a.get_response(), "abcdefghij");
    }

    #[test]
    fn test_rejects_after_ceiling_without_mutation() {
        let mut a = assembler(4);
        a.add_chunk(&StreamChunk::from("abcd"));
        let parts_before = a.parts().len();

        assert!(!a.add_chunk(&StreamChunk::from("e")));
        assert_eq!(a.parts().len(), parts_before);
        assert_eq!(a.size_bytes(), 4);
    }

    #[test]
    fn test_clip_respects_utf8() {
        let mut a = assembler(3);
        // "é" is two bytes; clipping at 3 would split the second one
        a.add_chunk(&StreamChunk::from("aéé"));
        assert_eq!(a.get_response(), "aé");
        assert_eq!(a.size_bytes(), 3);

        let mut b = assembler(2);
        b.add_chunk(&StreamChunk::from("aé"));
        assert_eq!(b.get_response(), "a");
        assert!(b.is_truncated());
    }

    #[test]
    fn test_context_limit_truncates_before_buffer_ceiling() {
        let mut a = ResponseAssembler::new(
            1024,
            Box::new(ContextTruncation::with_limit(ContextType::Code, 8)),
        );
        assert!(!a.add_chunk(&StreamChunk::from("line1\nline2\n")));
        assert_eq!(a.get_response(), "line1\n");
        assert!(a.is_truncated());
    }

    #[test]
    fn test_for_context_is_bounded_by_ceiling_alone() {
        let mut a = ResponseAssembler::for_context(ContextType::Chat, 1_048_576);
        let big = "x".repeat(20_000);
        assert!(a.add_chunk(&StreamChunk::from(big.as_str())));
        assert_eq!(a.size_bytes(), 20_000);
        assert!(!a.is_truncated());
    }

    #[test]
    fn test_code_at_ceiling_keeps_whole_lines() {
        let mut a = ResponseAssembler::for_context(ContextType::Code, 8);
        assert!(!a.add_chunk(&StreamChunk::from("line1\nline2\n")));
        assert_eq!(a.get_response(), "line1\n");
    }
}
