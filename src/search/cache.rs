//! In-memory search result cache
//!
//! Retention is configurable: without a TTL entries live for the process
//! lifetime, and without a size bound the cache grows unbounded. Expired
//! entries are evicted lazily on the next access. Concurrent writers to the
//! same key resolve last-write-wins.

use crate::config::SearchConfig;
use crate::search::{SearchCache, SearchResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Retention policy for [`MemoryCache`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entry lifetime; `None` keeps entries until evicted by size
    pub ttl: Option<Duration>,
    /// Entry bound; the oldest entry is evicted when exceeded
    pub max_entries: Option<usize>,
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
    /// Entries dropped to respect `max_entries`
    pub evictions: usize,
    /// Entries dropped because their TTL elapsed
    pub expirations: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: SearchResult,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.created_at.elapsed() >= ttl)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    config: CacheConfig,
    entries: RwLock<HashMap<String, CacheEntry>>,
    stats: RwLock<CacheStats>,
}

impl MemoryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Cache retaining entries as the `[search]` section says
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.cache_config())
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let stats = self.stats.read().await;
        CacheStats {
            entries: entries.len(),
            ..*stats
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;
        stats.evictions += entries.len();
        entries.clear();
    }
}

#[async_trait]
impl SearchCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<SearchResult> {
        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;

        match entries.get(key) {
            Some(entry) if entry.is_expired(self.config.ttl) => {
                entries.remove(key);
                stats.misses += 1;
                stats.expirations += 1;
                tracing::debug!(key = %key, "Cache entry expired");
                None
            }
            Some(entry) => {
                stats.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    async fn set(&self, key: &str, value: SearchResult) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: Instant::now(),
            },
        );

        let Some(max_entries) = self.config.max_entries else {
            return;
        };

        let mut evicted = 0;
        while entries.len() > max_entries {
            let oldest = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(oldest) => {
                    entries.remove(&oldest);
                    evicted += 1;
                }
                None => break,
            }
        }

        if evicted > 0 {
            self.stats.write().await.evictions += evicted;
            tracing::debug!(evicted = evicted, max_entries = max_entries, "Evicted oldest cache entries");
        }
    }
}
