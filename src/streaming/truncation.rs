//! Context-aware truncation
//!
//! A [`TruncationManager`] sees each chunk before it is buffered and decides
//! how much of it to keep. [`ContextTruncation`] applies a byte limit that
//! depends on the kind of content being streamed: code is cut on a line
//! boundary, prose on a UTF-8 character boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Standalone [`ContextTruncation`] limit for code (64 KiB)
pub const DEFAULT_CODE_LIMIT_BYTES: usize = 64 * 1024;

/// Standalone [`ContextTruncation`] limit for chat (16 KiB)
pub const DEFAULT_CHAT_LIMIT_BYTES: usize = 16 * 1024;

/// Standalone [`ContextTruncation`] limit for analysis (32 KiB)
pub const DEFAULT_ANALYSIS_LIMIT_BYTES: usize = 32 * 1024;

/// Kind of content being streamed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    Code,
    #[default]
    Chat,
    Analysis,
}

impl ContextType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::Code => "code",
            ContextType::Chat => "chat",
            ContextType::Analysis => "analysis",
        }
    }

    /// Limit used by [`ContextTruncation::new`]
    pub fn default_limit_bytes(&self) -> usize {
        match self {
            ContextType::Code => DEFAULT_CODE_LIMIT_BYTES,
            ContextType::Chat => DEFAULT_CHAT_LIMIT_BYTES,
            ContextType::Analysis => DEFAULT_ANALYSIS_LIMIT_BYTES,
        }
    }
}

/// Optional per-context byte limits
///
/// An unset limit leaves the assembler's `max_buffer` as the only bound for
/// that context type. A set limit only matters while it is below the
/// ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContextLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<usize>,
}

impl ContextLimits {
    pub fn with_limit(mut self, context_type: ContextType, limit: usize) -> Self {
        let slot = match context_type {
            ContextType::Code => &mut self.code,
            ContextType::Chat => &mut self.chat,
            ContextType::Analysis => &mut self.analysis,
        };
        *slot = Some(limit);
        self
    }

    pub fn get(&self, context_type: ContextType) -> Option<usize> {
        match context_type {
            ContextType::Code => self.code,
            ContextType::Chat => self.chat,
            ContextType::Analysis => self.analysis,
        }
    }

    /// Effective limit for `context_type` under a `max_buffer` ceiling
    pub fn limit_for(&self, context_type: ContextType, max_buffer: usize) -> usize {
        self.get(context_type)
            .map_or(max_buffer, |limit| limit.min(max_buffer))
    }

    /// Truncation manager for one stream of `context_type`
    pub fn truncation_for(
        &self,
        context_type: ContextType,
        max_buffer: usize,
    ) -> ContextTruncation {
        ContextTruncation::with_limit(context_type, self.limit_for(context_type, max_buffer))
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "code" => Ok(ContextType::Code),
            "chat" => Ok(ContextType::Chat),
            "analysis" => Ok(ContextType::Analysis),
            other => Err(format!(
                "unknown context type '{}' (expected code, chat or analysis)",
                other
            )),
        }
    }
}

/// Outcome of offering one chunk to a truncation manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationStep {
    /// The part of the chunk to keep
    pub text: String,
    /// No further chunks should be accepted
    pub done: bool,
}

/// Per-chunk truncation policy
pub trait TruncationManager: Send {
    fn append(&mut self, text: &str) -> TruncationStep;
}

/// Largest index `<= index` that lies on a char boundary of `s`
pub(crate) fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Byte-limited truncation keyed on [`ContextType`]
#[derive(Debug, Clone)]
pub struct ContextTruncation {
    context_type: ContextType,
    limit: usize,
    consumed: usize,
    done: bool,
}

impl ContextTruncation {
    pub fn new(context_type: ContextType) -> Self {
        Self::with_limit(context_type, context_type.default_limit_bytes())
    }

    pub fn with_limit(context_type: ContextType, limit: usize) -> Self {
        Self {
            context_type,
            limit,
            consumed: 0,
            done: limit == 0,
        }
    }

    pub fn context_type(&self) -> ContextType {
        self.context_type
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn cut_point(&self, text: &str, remaining: usize) -> usize {
        let boundary = floor_char_boundary(text, remaining);
        match self.context_type {
            // Keep whole lines; a single over-long line falls back to chars
            ContextType::Code => text[..boundary]
                .rfind('\n')
                .map(|i| i + 1)
                .unwrap_or(boundary),
            ContextType::Chat | ContextType::Analysis => boundary,
        }
    }
}

impl TruncationManager for ContextTruncation {
    fn append(&mut self, text: &str) -> TruncationStep {
        if self.done {
            return TruncationStep {
                text: String::new(),
                done: true,
            };
        }

        let remaining = self.limit - self.consumed;
        if text.len() <= remaining {
            self.consumed += text.len();
            self.done = self.consumed >= self.limit;
            return TruncationStep {
                text: text.to_string(),
                done: self.done,
            };
        }

        let cut = self.cut_point(text, remaining);
        self.consumed += cut;
        self.done = true;
        tracing::debug!(
            context_type = %self.context_type,
            limit = self.limit,
            kept = cut,
            dropped = text.len() - cut,
            "Context limit reached"
        );
        TruncationStep {
            text: text[..cut].to_string(),
            done: true,
        }
    }
}
