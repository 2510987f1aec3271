//! Context augmentation search
//!
//! Query and result types, plus the three seams the search pipeline is
//! built on: a [`SearchEngine`], a [`SearchCache`] and an optional
//! [`PerformanceMonitor`].

pub mod cache;
pub mod hybrid;
pub mod keyword;
pub mod rag;

pub use cache::{CacheConfig, CacheStats, MemoryCache};
pub use hybrid::HybridSearchCoordinator;
pub use keyword::KeywordIndex;
pub use rag::{RAG_CONFIDENCE, VectorRagSystem};

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Documents returned when a query does not set a limit
pub const DEFAULT_RESULT_LIMIT: usize = 5;

/// Query discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Meaning-based retrieval, served by the RAG retriever when configured
    Semantic,
    #[default]
    Lexical,
}

/// A context lookup
///
/// Filters live in a `BTreeMap` so the cache key does not depend on the
/// order in which they were added.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SearchQuery {
    text: String,
    #[serde(default)]
    query_type: QueryType,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    filters: BTreeMap<String, String>,
}

fn default_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}

impl SearchQuery {
    /// Lexical query with the default limit
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            query_type: QueryType::Lexical,
            limit: DEFAULT_RESULT_LIMIT,
            filters: BTreeMap::new(),
        }
    }

    pub fn semantic(mut self) -> Self {
        self.query_type = QueryType::Semantic;
        self
    }

    pub fn with_query_type(mut self, query_type: QueryType) -> Self {
        self.query_type = query_type;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Restrict results to documents whose `key` attribute equals `value`
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    /// Canonical cache key; identical queries always produce the same key
    pub fn cache_key(&self) -> AppResult<String> {
        serde_json::to_string(self)
            .map(|encoded| format!("search:{}", encoded))
            .map_err(|e| AppError::Search(format!("failed to encode cache key: {}", e)))
    }
}

/// One retrieved document
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    /// Engine-specific relevance in `[0, 1]`
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            score: 0.0,
            source: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Which path produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Rag,
    Lexical,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SearchMetadata {
    pub search_method: SearchMethod,
    /// Heuristic in `[0, 1]`; not calibrated
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SearchResult {
    pub documents: Vec<Document>,
    pub metadata: SearchMetadata,
}

impl SearchResult {
    pub fn new(documents: Vec<Document>, search_method: SearchMethod, confidence: f64) -> Self {
        Self {
            documents,
            metadata: SearchMetadata {
                search_method,
                confidence: confidence.clamp(0.0, 1.0),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents rendered as a prompt preamble, or `None` when there are none
    pub fn to_context_block(&self) -> Option<String> {
        if self.documents.is_empty() {
            return None;
        }

        let mut block = String::from("Relevant context:\n");
        for doc in &self.documents {
            match &doc.source {
                Some(source) => block.push_str(&format!("--- {} ({})\n", doc.id, source)),
                None => block.push_str(&format!("--- {}\n", doc.id)),
            }
            block.push_str(doc.content.trim_end());
            block.push('\n');
        }
        Some(block)
    }
}

/// Search engine contract
#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> AppResult<SearchResult>;
}

/// Cache contract; the implementation owns expiry
#[async_trait]
pub trait SearchCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<SearchResult>;
    async fn set(&self, key: &str, value: SearchResult);
}

/// Opaque timer started by a [`PerformanceMonitor`]
#[derive(Debug)]
pub struct TimerHandle {
    operation: &'static str,
    started: Instant,
}

impl TimerHandle {
    pub fn start(operation: &'static str) -> Self {
        Self {
            operation,
            started: Instant::now(),
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Timer instrumentation contract
pub trait PerformanceMonitor: Send + Sync {
    fn start_timer(&self, operation: &'static str) -> TimerHandle {
        TimerHandle::start(operation)
    }

    fn end_timer(&self, handle: TimerHandle);

    /// Called once per cache lookup
    fn cache_lookup(&self, _hit: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_ignores_filter_insertion_order() {
        let a = SearchQuery::new("tokio runtime")
            .with_filter("lang", "rust")
            .with_filter("kind", "doc");
        let b = SearchQuery::new("tokio runtime")
            .with_filter("kind", "doc")
            .with_filter("lang", "rust");
        assert_eq!(a.cache_key().unwrap(), b.cache_key().unwrap());
    }

    #[test]
    fn test_cache_key_distinguishes_query_type() {
        let lexical = SearchQuery::new("q");
        let semantic = SearchQuery::new("q").semantic();
        assert_ne!(lexical.cache_key().unwrap(), semantic.cache_key().unwrap());
    }

    #[test]
    fn test_confidence_is_clamped() {
        let r = SearchResult::new(vec![], SearchMethod::Lexical, 1.7);
        assert_eq!(r.metadata.confidence, 1.0);
    }

    #[test]
    fn test_context_block() {
        let empty = SearchResult::new(vec![], SearchMethod::Rag, 0.0);
        assert!(empty.to_context_block().is_none());

        let r = SearchResult::new(
            vec![Document::new("d1", "alpha\n").with_source("notes.md")],
            SearchMethod::Rag,
            0.8,
        );
        assert_eq!(
            r.to_context_block().unwrap(),
            "Relevant context:\n--- d1 (notes.md)\nalpha\n"
        );
    }

    #[test]
    fn test_query_deserializes_with_defaults() {
        let q: SearchQuery = serde_json::from_str(r#"{"text": "x"}"#).unwrap();
        assert_eq!(q.query_type(), QueryType::Lexical);
        assert_eq!(q.limit(), DEFAULT_RESULT_LIMIT);
    }
}
