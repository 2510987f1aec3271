//! Integration tests for cached context search
//!
//! Identical queries are answered from the cache without touching the
//! engine, semantic queries go through the retriever when one is present,
//! and cache traffic is visible through the metrics monitor.

use assistroute::config::Config;
use assistroute::metrics::{CacheResult, Metrics};
use assistroute::search::{
    CacheConfig, HybridSearchCoordinator, KeywordIndex, MemoryCache, SearchMethod, SearchQuery,
    VectorRagSystem,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

fn index() -> Arc<KeywordIndex> {
    Arc::new(
        KeywordIndex::new()
            .with_document("router", "The router selects a backend under constraints")
            .with_document("cache", "Search results are cached by query key")
            .with_document("stream", "Streamed chunks are assembled under a ceiling"),
    )
}

#[tokio::test]
async fn test_identical_queries_hit_the_engine_once() {
    let index = index();
    let cache = Arc::new(MemoryCache::default());
    let search = HybridSearchCoordinator::new(index.clone(), cache.clone());
    let query = SearchQuery::new("backend constraints");

    let first = search.search(&query).await.unwrap();
    let second = search.search(&query).await.unwrap();
    let third = search.search(&SearchQuery::new("backend constraints")).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first, third);
    assert_eq!(index.search_count(), 1);

    let stats = cache.stats().await;
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn test_queries_differing_in_limit_are_cached_separately() {
    let index = index();
    let search = HybridSearchCoordinator::new(index.clone(), Arc::new(MemoryCache::default()));

    search.search(&SearchQuery::new("chunks")).await.unwrap();
    search
        .search(&SearchQuery::new("chunks").with_limit(1))
        .await
        .unwrap();

    assert_eq!(index.search_count(), 2);
}

#[tokio::test]
async fn test_expired_entries_are_recomputed() {
    let index = index();
    let cache = Arc::new(MemoryCache::new(
        CacheConfig::default().with_ttl(Duration::ZERO),
    ));
    let search = HybridSearchCoordinator::new(index.clone(), cache.clone());
    let query = SearchQuery::new("query key");

    search.search(&query).await.unwrap();
    search.search(&query).await.unwrap();

    assert_eq!(index.search_count(), 2);
    assert_eq!(cache.stats().await.expirations, 1);
}

#[tokio::test]
async fn test_cache_built_from_search_section_applies_retention() {
    let config = Config::from_str(
        r#"
        [[backends]]
        id = "local"
        kind = "local"
        [[backends.models]]
        name = "m"

        [search]
        cache_ttl_seconds = 0
        cache_max_entries = 8
        "#,
    )
    .unwrap();
    let cache = Arc::new(MemoryCache::from_config(&config.search));
    assert_eq!(cache.config().ttl, Some(Duration::ZERO));
    assert_eq!(cache.config().max_entries, Some(8));

    let index = index();
    let search = HybridSearchCoordinator::new(index.clone(), cache.clone());
    let query = SearchQuery::new("backend");
    search.search(&query).await.unwrap();
    search.search(&query).await.unwrap();

    assert_eq!(index.search_count(), 2, "a zero TTL never serves a hit");
    assert_eq!(cache.stats().await.expirations, 1);
}

#[tokio::test]
async fn test_semantic_query_is_tagged_rag_and_cached() {
    let index = index();
    let retriever = Arc::new(VectorRagSystem::new(index.clone()));
    let search = HybridSearchCoordinator::new(index.clone(), Arc::new(MemoryCache::default()))
        .with_retriever(retriever);
    let query = SearchQuery::new("assembled chunks").semantic();

    let result = search.search(&query).await.unwrap();
    let again = search.search(&query).await.unwrap();

    assert_eq!(result.metadata.search_method, SearchMethod::Rag);
    assert_eq!(result.documents[0].id, "stream");
    assert_eq!(result, again);
    assert_eq!(index.search_count(), 1);
}

#[tokio::test]
async fn test_no_match_yields_empty_result_and_no_context_block() {
    let search = HybridSearchCoordinator::new(index(), Arc::new(MemoryCache::default()));

    let result = search.search(&SearchQuery::new("kubernetes")).await.unwrap();

    assert!(result.is_empty());
    assert_eq!(result.metadata.confidence, 0.0);
    assert!(result.to_context_block().is_none());
}

#[tokio::test]
async fn test_metrics_monitor_counts_hits_and_misses() {
    let metrics = Arc::new(Metrics::new().unwrap());
    let search = HybridSearchCoordinator::new(index(), Arc::new(MemoryCache::default()))
        .with_monitor(metrics.clone());
    let query = SearchQuery::new("router");

    for _ in 0..3 {
        search.search(&query).await.unwrap();
    }

    assert_eq!(metrics.cache_lookups_count(CacheResult::Miss), 1);
    assert_eq!(metrics.cache_lookups_count(CacheResult::Hit), 2);

    let exposition = metrics.gather().unwrap();
    assert!(exposition.contains("assistroute_search_duration_ms"));
}
