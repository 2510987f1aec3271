//! In-memory lexical search
//!
//! Scores documents by term overlap: `|query ∩ doc| / |query|` over
//! lowercased alphanumeric terms. No IDF or length normalisation.

use crate::error::AppResult;
use crate::search::{Document, SearchEngine, SearchMethod, SearchQuery, SearchResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
struct IndexedDocument {
    document: Document,
    terms: HashSet<String>,
    attributes: BTreeMap<String, String>,
}

/// Lexical search engine over documents held in memory
#[derive(Debug, Default)]
pub struct KeywordIndex {
    documents: Vec<IndexedDocument>,
    searches: AtomicUsize,
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a document; `attributes` are matched against query filters
    pub fn add_document(&mut self, document: Document, attributes: BTreeMap<String, String>) {
        let terms = terms(&document.content);
        self.documents.push(IndexedDocument {
            document,
            terms,
            attributes,
        });
    }

    pub fn with_document(mut self, id: impl Into<String>, content: impl Into<String>) -> Self {
        self.add_document(Document::new(id, content), BTreeMap::new());
        self
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of searches served
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SearchEngine for KeywordIndex {
    async fn search(&self, query: &SearchQuery) -> AppResult<SearchResult> {
        self.searches.fetch_add(1, Ordering::Relaxed);

        let query_terms = terms(query.text());
        let denominator = query_terms.len().max(1) as f64;

        let mut scored: Vec<Document> = self
            .documents
            .iter()
            .filter(|indexed| {
                query
                    .filters()
                    .iter()
                    .all(|(key, value)| indexed.attributes.get(key) == Some(value))
            })
            .filter_map(|indexed| {
                let overlap = query_terms.intersection(&indexed.terms).count();
                (overlap > 0).then(|| {
                    indexed
                        .document
                        .clone()
                        .with_score(overlap as f64 / denominator)
                })
            })
            .collect();

        // Stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(query.limit());

        let confidence = scored.first().map(|d| d.score).unwrap_or(0.0);
        tracing::debug!(
            query = %query.text(),
            matched = scored.len(),
            confidence = confidence,
            "Keyword search completed"
        );

        Ok(SearchResult::new(scored, SearchMethod::Lexical, confidence))
    }
}
