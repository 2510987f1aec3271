//! Semantic retrieval wrapper
//!
//! Delegates to an underlying engine and relabels the result as RAG output.
//! The confidence is a fixed heuristic, not a relevance score: callers must
//! not treat it as calibrated.

use crate::error::AppResult;
use crate::search::{SearchEngine, SearchMethod, SearchQuery, SearchResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Confidence reported when at least one document was retrieved
pub const RAG_CONFIDENCE: f64 = 0.8;

pub struct VectorRagSystem {
    engine: Arc<dyn SearchEngine>,
}

impl VectorRagSystem {
    pub fn new(engine: Arc<dyn SearchEngine>) -> Self {
        Self { engine }
    }
}

impl std::fmt::Debug for VectorRagSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorRagSystem").finish_non_exhaustive()
    }
}

#[async_trait]
impl SearchEngine for VectorRagSystem {
    async fn search(&self, query: &SearchQuery) -> AppResult<SearchResult> {
        let inner = self.engine.search(query).await?;
        let confidence = if inner.documents.is_empty() {
            0.0
        } else {
            RAG_CONFIDENCE
        };

        Ok(SearchResult::new(inner.documents, SearchMethod::Rag, confidence))
    }
}
