//! Cache-aside search dispatch
//!
//! Lookup order: cache, then either the semantic retriever (semantic
//! queries, when one is configured) or the lexical engine. Computed results
//! are written back before returning. Engine errors propagate and leave the
//! cache untouched.

use crate::error::AppResult;
use crate::search::{
    PerformanceMonitor, QueryType, SearchCache, SearchEngine, SearchQuery, SearchResult,
    VectorRagSystem,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct HybridSearchCoordinator {
    lexical: Arc<dyn SearchEngine>,
    retriever: Option<Arc<VectorRagSystem>>,
    cache: Arc<dyn SearchCache>,
    monitor: Option<Arc<dyn PerformanceMonitor>>,
}

impl std::fmt::Debug for HybridSearchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSearchCoordinator")
            .field("has_retriever", &self.retriever.is_some())
            .field("has_monitor", &self.monitor.is_some())
            .finish_non_exhaustive()
    }
}

impl HybridSearchCoordinator {
    pub fn new(lexical: Arc<dyn SearchEngine>, cache: Arc<dyn SearchCache>) -> Self {
        Self {
            lexical,
            retriever: None,
            cache,
            monitor: None,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<VectorRagSystem>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn PerformanceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn has_retriever(&self) -> bool {
        self.retriever.is_some()
    }

    /// Resolve `query`, consulting the cache first
    ///
    /// The monitor's timer spans the whole lookup, cache hits included.
    pub async fn search(&self, query: &SearchQuery) -> AppResult<SearchResult> {
        let timer = self.monitor.as_ref().map(|m| m.start_timer("search"));
        let outcome = self.lookup(query).await;
        if let (Some(monitor), Some(timer)) = (self.monitor.as_ref(), timer) {
            monitor.end_timer(timer);
        }
        outcome
    }

    async fn lookup(&self, query: &SearchQuery) -> AppResult<SearchResult> {
        let key = query.cache_key()?;

        if let Some(cached) = self.cache.get(&key).await {
            if let Some(monitor) = &self.monitor {
                monitor.cache_lookup(true);
            }
            tracing::debug!(query = %query.text(), "Search cache hit");
            return Ok(cached);
        }
        if let Some(monitor) = &self.monitor {
            monitor.cache_lookup(false);
        }

        let result = match (query.query_type(), &self.retriever) {
            (QueryType::Semantic, Some(retriever)) => retriever.search(query).await?,
            _ => self.lexical.search(query).await?,
        };

        tracing::debug!(
            query = %query.text(),
            method = ?result.metadata.search_method,
            documents = result.documents.len(),
            "Search cache populated"
        );
        self.cache.set(&key, result.clone()).await;
        Ok(result)
    }
}

#[async_trait]
impl SearchEngine for HybridSearchCoordinator {
    async fn search(&self, query: &SearchQuery) -> AppResult<SearchResult> {
        HybridSearchCoordinator::search(self, query).await
    }
}
