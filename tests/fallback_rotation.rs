//! Integration tests for round-robin fallback candidates
//!
//! The load balancer never offers the failing backend, rotates its starting
//! offset on every call, and stays well-defined when called concurrently.

use assistroute::models::{
    Backend, BackendId, BackendKind, LoadBalancer, ModelSpec, ProviderRegistry,
};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

fn balancer(ids: &[&str]) -> Arc<LoadBalancer> {
    let mut registry = ProviderRegistry::new();
    for id in ids {
        registry
            .register(Backend::new(*id, BackendKind::Remote).with_model(ModelSpec::new("m")))
            .unwrap();
    }
    Arc::new(LoadBalancer::new(Arc::new(registry)))
}

fn ids(candidates: &[Arc<Backend>]) -> Vec<String> {
    candidates.iter().map(|b| b.id().to_string()).collect()
}

#[test]
fn test_current_backend_is_never_offered() {
    let lb = balancer(&["a", "b", "c", "d"]);
    let current = BackendId::from("c");

    for _ in 0..12 {
        let candidates = lb.get_fallback_providers(&current, 3);
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|b| b.id() != &current));
    }
}

#[test]
fn test_consecutive_calls_start_one_position_further() {
    let lb = balancer(&["a", "b", "c", "d"]);
    let current = BackendId::from("a");

    let firsts: Vec<String> = (0..6)
        .map(|_| ids(&lb.get_fallback_providers(&current, 1)).remove(0))
        .collect();

    assert_eq!(firsts, vec!["b", "c", "d", "b", "c", "d"]);
}

#[test]
fn test_count_larger_than_eligible_returns_each_once() {
    let lb = balancer(&["a", "b", "c"]);

    let candidates = lb.get_fallback_providers(&BackendId::from("b"), 10);

    assert_eq!(ids(&candidates), vec!["a", "c"]);
}

#[test]
fn test_single_backend_has_no_fallbacks() {
    let lb = balancer(&["only"]);

    assert!(
        lb.get_fallback_providers(&BackendId::from("only"), 2)
            .is_empty()
    );
    // Cursor stays in range even with an empty eligible set
    assert_eq!(lb.cursor(), 0);
}

#[test]
fn test_unknown_current_rotates_over_all_backends() {
    let lb = balancer(&["a", "b"]);

    let first = lb.get_fallback_providers(&BackendId::from("gone"), 2);
    let second = lb.get_fallback_providers(&BackendId::from("gone"), 2);

    assert_eq!(ids(&first), vec!["a", "b"]);
    assert_eq!(ids(&second), vec!["b", "a"]);
}

#[tokio::test]
async fn test_concurrent_calls_spread_starting_offsets_evenly() {
    let lb = balancer(&["a", "b", "c", "d"]);
    let mut handles = Vec::new();

    for _ in 0..30 {
        let lb = Arc::clone(&lb);
        handles.push(tokio::spawn(async move {
            let current = BackendId::from("a");
            lb.get_fallback_providers(&current, 1)[0].id().to_string()
        }));
    }

    let mut starts: HashMap<String, usize> = HashMap::new();
    for handle in handles {
        *starts.entry(handle.await.unwrap()).or_default() += 1;
    }

    // 30 calls over 3 eligible backends: each offset is taken exactly 10 times
    assert_eq!(starts.len(), 3);
    assert!(starts.values().all(|&n| n == 10), "got {:?}", starts);
}

proptest! {
    #[test]
    fn candidates_exclude_current_and_respect_count(
        size in 1usize..10,
        current in 0usize..10,
        count in 0usize..6,
        calls in 1usize..20,
    ) {
        let names: Vec<String> = (0..size).map(|i| format!("b{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let lb = balancer(&refs);
        let current = BackendId::from(format!("b{}", current));
        let eligible = names.iter().filter(|n| n.as_str() != current.as_str()).count();

        for _ in 0..calls {
            let candidates = lb.get_fallback_providers(&current, count);
            prop_assert_eq!(candidates.len(), count.min(eligible));
            prop_assert!(candidates.iter().all(|b| b.id() != &current));
            prop_assert!(lb.cursor() < eligible.max(1));
        }
    }
}
