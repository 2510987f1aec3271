//! Routing outcome tracking
//!
//! Keeps a bounded, insertion-ordered ring of routing decisions. When the
//! ring grows past its capacity it is compacted to the most recent records
//! (age-based, not LRU). Nothing is persisted across restarts.

use crate::router::RoutingDecision;
use std::collections::VecDeque;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Records held before compaction
pub const RING_CAPACITY: usize = 1000;
/// Records kept after compaction
pub const RING_RETAIN: usize = 500;

/// One routing decision and what became of it
#[derive(Debug, Clone)]
pub struct PerformanceRecord {
    decision: RoutingDecision,
    timestamp: SystemTime,
    observed_latency_ms: Option<f64>,
}

impl PerformanceRecord {
    pub fn decision(&self) -> &RoutingDecision {
        &self.decision
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn observed_latency_ms(&self) -> Option<f64> {
        self.observed_latency_ms
    }

    /// Observed latency when known, otherwise the decision's estimate
    pub fn latency_ms(&self) -> Option<f64> {
        self.observed_latency_ms
            .or_else(|| self.decision.estimated_latency_ms())
    }
}

/// Bounded ring of routing decisions
#[derive(Debug)]
pub struct PerformanceTracker {
    records: RwLock<VecDeque<PerformanceRecord>>,
    capacity: usize,
    retain: usize,
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::with_limits(RING_CAPACITY, RING_RETAIN)
    }

    /// Custom limits; `retain` is clamped to `capacity`
    pub fn with_limits(capacity: usize, retain: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity.min(RING_CAPACITY) + 1)),
            capacity,
            retain: retain.min(capacity),
        }
    }

    /// Append a decision to the ring
    pub async fn record_decision(&self, decision: RoutingDecision) {
        let mut records = self.records.write().await;
        records.push_back(PerformanceRecord {
            decision,
            timestamp: SystemTime::now(),
            observed_latency_ms: None,
        });

        if records.len() > self.capacity {
            let evicted = records.len() - self.retain;
            records.drain(..evicted);
            tracing::debug!(
                evicted = evicted,
                retained = records.len(),
                "Compacted performance ring"
            );
        }
    }

    /// Attach the observed latency to a recorded decision
    ///
    /// Returns false if the decision has already been evicted (or was never
    /// recorded).
    pub async fn record_latency(&self, decision_id: Uuid, latency: Duration) -> bool {
        let mut records = self.records.write().await;
        match records
            .iter_mut()
            .rev()
            .find(|r| r.decision.id() == decision_id)
        {
            Some(record) => {
                record.observed_latency_ms = Some(latency.as_secs_f64() * 1000.0);
                true
            }
            None => {
                tracing::debug!(
                    decision_id = %decision_id,
                    "Latency reported for a decision no longer in the ring"
                );
                false
            }
        }
    }

    /// Mean latency in milliseconds over the current ring contents
    ///
    /// Records with neither an observed nor an estimated latency are skipped.
    /// Returns `0.0` when nothing contributes.
    pub async fn average_latency(&self) -> f64 {
        let records = self.records.read().await;
        let (sum, count) = records
            .iter()
            .filter_map(PerformanceRecord::latency_ms)
            .fold((0.0, 0usize), |(sum, count), latency| (sum + latency, count + 1));

        if count == 0 { 0.0 } else { sum / count as f64 }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Snapshot of the ring, oldest first
    pub async fn records(&self) -> Vec<PerformanceRecord> {
        self.records.read().await.iter().cloned().collect()
    }
}
