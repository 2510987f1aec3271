//! Prometheus metrics collection for assistroute
//!
//! Tracks:
//! - Backend attempts by backend and outcome
//! - Fallbacks away from a failing backend
//! - Truncated responses by context type
//! - Search cache hits and misses
//! - Search latency
//!
//! Label values come from closed enums or from configured backend ids, so
//! cardinality is bounded by configuration.

use crate::models::BackendId;
use crate::search::{PerformanceMonitor, TimerHandle};
use crate::streaming::ContextType;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Result of one backend attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheResult {
    Hit,
    Miss,
}

impl CacheResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheResult::Hit => "hit",
            CacheResult::Miss => "miss",
        }
    }
}

/// Metrics collector
///
/// Cloning shares the underlying registry.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    requests_total: IntCounterVec,
    fallbacks_total: IntCounterVec,
    truncations_total: IntCounterVec,
    cache_lookups_total: IntCounterVec,
    search_duration: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create a new Metrics instance with its own registry
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: N backends × 2 outcomes
        let requests_total = IntCounterVec::new(
            Opts::new(
                "assistroute_requests_total",
                "Total backend attempts by backend and outcome",
            ),
            &["backend", "outcome"],
        )?;

        let fallbacks_total = IntCounterVec::new(
            Opts::new(
                "assistroute_fallbacks_total",
                "Total fallbacks away from a failing backend",
            ),
            &["from"],
        )?;

        // Cardinality: 3 context types
        let truncations_total = IntCounterVec::new(
            Opts::new(
                "assistroute_truncations_total",
                "Total responses truncated by the buffer ceiling or context limit",
            ),
            &["context_type"],
        )?;

        let cache_lookups_total = IntCounterVec::new(
            Opts::new(
                "assistroute_cache_lookups_total",
                "Total search cache lookups by result",
            ),
            &["result"],
        )?;

        let search_duration = Histogram::with_opts(
            HistogramOpts::new(
                "assistroute_search_duration_ms",
                "Context search latency in milliseconds, cache hits included",
            )
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0]),
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(fallbacks_total.clone()))?;
        registry.register(Box::new(truncations_total.clone()))?;
        registry.register(Box::new(cache_lookups_total.clone()))?;
        registry.register(Box::new(search_duration.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            fallbacks_total,
            truncations_total,
            cache_lookups_total,
            search_duration,
        })
    }

    /// Record one backend attempt
    pub fn record_request(&self, backend: &BackendId, outcome: Outcome) {
        self.requests_total
            .with_label_values(&[backend.as_str(), outcome.as_str()])
            .inc();
    }

    /// Record a fallback away from `from`
    pub fn record_fallback(&self, from: &BackendId) {
        self.fallbacks_total
            .with_label_values(&[from.as_str()])
            .inc();
    }

    pub fn record_truncation(&self, context_type: ContextType) {
        self.truncations_total
            .with_label_values(&[context_type.as_str()])
            .inc();
    }

    pub fn record_cache_lookup(&self, result: CacheResult) {
        self.cache_lookups_total
            .with_label_values(&[result.as_str()])
            .inc();
    }

    /// Record search latency
    ///
    /// # Errors
    ///
    /// Returns an error if `duration_ms` is NaN, infinite, or negative;
    /// such values would corrupt every histogram percentile.
    pub fn record_search_duration(&self, duration_ms: f64) -> Result<(), prometheus::Error> {
        if !duration_ms.is_finite() {
            return Err(prometheus::Error::Msg(format!(
                "Histogram value must be finite (not NaN or Infinity), got: {}",
                duration_ms
            )));
        }
        if duration_ms < 0.0 {
            return Err(prometheus::Error::Msg(format!(
                "Histogram value must be non-negative, got: {}",
                duration_ms
            )));
        }

        self.search_duration.observe(duration_ms);
        Ok(())
    }

    /// Count for one label combination of `assistroute_requests_total`
    pub fn requests_count(&self, backend: &BackendId, outcome: Outcome) -> u64 {
        self.requests_total
            .with_label_values(&[backend.as_str(), outcome.as_str()])
            .get()
    }

    pub fn fallbacks_count(&self, from: &BackendId) -> u64 {
        self.fallbacks_total.with_label_values(&[from.as_str()]).get()
    }

    pub fn truncations_count(&self, context_type: ContextType) -> u64 {
        self.truncations_total
            .with_label_values(&[context_type.as_str()])
            .get()
    }

    pub fn cache_lookups_count(&self, result: CacheResult) -> u64 {
        self.cache_lookups_total
            .with_label_values(&[result.as_str()])
            .get()
    }

    /// Gather all metrics and encode them in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if metric encoding fails.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let metric_count = metric_families.len();

        tracing::debug!(
            metric_family_count = metric_count,
            "Encoding metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();

        encoder.encode(&metric_families, &mut buffer).map_err(|e| {
            let metric_names: Vec<_> = metric_families.iter().map(|mf| mf.name()).collect();

            tracing::error!(
                error = %e,
                metric_family_count = metric_count,
                metric_names = ?metric_names,
                "Prometheus text encoder failed"
            );

            prometheus::Error::Msg(format!(
                "Failed to encode {} metric families: {}. Metrics: {:?}",
                metric_count, e, metric_names
            ))
        })?;

        String::from_utf8(buffer).map_err(|e| {
            let valid_up_to = e.utf8_error().valid_up_to();
            tracing::error!(
                invalid_byte_index = valid_up_to,
                "Prometheus encoder produced invalid UTF-8"
            );
            prometheus::Error::Msg(format!(
                "Failed to convert metrics to UTF-8 at byte {}: {}",
                valid_up_to, e
            ))
        })
    }
}

impl PerformanceMonitor for Metrics {
    fn end_timer(&self, handle: TimerHandle) {
        let elapsed_ms = handle.elapsed().as_secs_f64() * 1000.0;
        if let Err(e) = self.record_search_duration(elapsed_ms) {
            tracing::warn!(
                error = %e,
                operation = handle.operation(),
                "Failed to record search duration"
            );
        }
    }

    fn cache_lookup(&self, hit: bool) {
        self.record_cache_lookup(if hit { CacheResult::Hit } else { CacheResult::Miss });
    }
}
