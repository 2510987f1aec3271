//! Round-robin fallback candidates
//!
//! The rotation cursor is owned by the balancer and advanced atomically, so
//! concurrent requests each observe a distinct offset in the order their
//! calls land. Rotation is for fairness across repeated fallbacks; it does
//! not look at weights.

use crate::models::backend::{Backend, BackendId};
use crate::models::registry::ProviderRegistry;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default number of fallback candidates returned per call
pub const DEFAULT_FALLBACK_CANDIDATES: usize = 2;

/// Produces rotating fallback candidate lists
#[derive(Debug)]
pub struct LoadBalancer {
    registry: Arc<ProviderRegistry>,
    cursor: AtomicUsize,
}

impl LoadBalancer {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Current rotation offset (before the next call)
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Fallback candidates for `current`, rotated by the shared cursor
    ///
    /// The eligible set is every registered backend except `current`, in
    /// registration order. The list is rotated by the cursor and the first
    /// `count` entries are returned. The cursor then advances by one modulo
    /// `max(1, eligible)`, so every call starts one position further along.
    pub fn get_fallback_providers(&self, current: &BackendId, count: usize) -> Vec<Arc<Backend>> {
        let eligible: Vec<&Arc<Backend>> = self
            .registry
            .backends()
            .iter()
            .filter(|b| b.id() != current)
            .collect();

        let modulus = eligible.len().max(1);
        let previous = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                Some((c + 1) % modulus)
            })
            .unwrap_or_else(|c| c);

        if eligible.is_empty() {
            tracing::debug!(
                current = %current,
                "No fallback candidates: current backend is the only one registered"
            );
            return Vec::new();
        }

        let offset = previous % eligible.len();
        let candidates: Vec<Arc<Backend>> = eligible
            .iter()
            .cycle()
            .skip(offset)
            .take(count.min(eligible.len()))
            .map(|b| Arc::clone(b))
            .collect();

        tracing::debug!(
            current = %current,
            offset = offset,
            requested = count,
            candidates = ?candidates.iter().map(|b| b.id().as_str()).collect::<Vec<_>>(),
            "Computed fallback candidates"
        );

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::backend::{BackendKind, ModelSpec};

    fn balancer(ids: &[&str]) -> LoadBalancer {
        let mut registry = ProviderRegistry::new();
        for id in ids {
            registry
                .register(Backend::new(*id, BackendKind::Remote).with_model(ModelSpec::new("m")))
                .unwrap();
        }
        LoadBalancer::new(Arc::new(registry))
    }

    fn ids(candidates: &[Arc<Backend>]) -> Vec<&str> {
        candidates.iter().map(|b| b.id().as_str()).collect()
    }

    #[test]
    fn test_rotation_advances_each_call() {
        let lb = balancer(&["a", "b", "c"]);
        let current = BackendId::from("a");

        let first = lb.get_fallback_providers(&current, 2);
        let second = lb.get_fallback_providers(&current, 2);
        let third = lb.get_fallback_providers(&current, 2);

        assert_eq!(ids(&first), vec!["b", "c"]);
        assert_eq!(ids(&second), vec!["c", "b"]);
        assert_eq!(ids(&third), vec!["b", "c"], "offset wraps modulo eligible size");
    }

    #[test]
    fn test_current_backend_is_excluded() {
        let lb = balancer(&["a", "b", "c", "d"]);
        for _ in 0..8 {
            let candidates = lb.get_fallback_providers(&BackendId::from("c"), 3);
            assert!(!ids(&candidates).contains(&"c"));
            assert_eq!(candidates.len(), 3);
        }
    }

    #[test]
    fn test_count_larger_than_eligible_set() {
        let lb = balancer(&["a", "b"]);
        let candidates = lb.get_fallback_providers(&BackendId::from("a"), 5);
        assert_eq!(ids(&candidates), vec!["b"]);
    }

    #[test]
    fn test_single_backend_yields_no_candidates() {
        let lb = balancer(&["only"]);
        assert!(lb.get_fallback_providers(&BackendId::from("only"), 2).is_empty());
        assert_eq!(lb.cursor(), 0, "cursor wraps modulo max(1, 0)");
    }

    #[test]
    fn test_unknown_current_rotates_over_all_backends() {
        let lb = balancer(&["a", "b", "c"]);
        let first = lb.get_fallback_providers(&BackendId::from("zzz"), 1);
        let second = lb.get_fallback_providers(&BackendId::from("zzz"), 1);
        assert_eq!(ids(&first), vec!["a"]);
        assert_eq!(ids(&second), vec!["b"]);
    }

    #[test]
    fn test_cursor_is_shared_across_current_ids() {
        let lb = balancer(&["a", "b", "c"]);
        lb.get_fallback_providers(&BackendId::from("a"), 2);
        let from_b = lb.get_fallback_providers(&BackendId::from("b"), 2);
        assert_eq!(ids(&from_b), vec!["c", "a"]);
    }
}
