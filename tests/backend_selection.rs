//! Integration tests for constraint-filtered backend selection
//!
//! Verifies that ModelSelector only ever returns backends satisfying every
//! active constraint, prefers the highest weight, keeps registration order on
//! ties, and reports NoEligibleProvider with the constraints that failed.

use assistroute::config::Config;
use assistroute::error::AppError;
use assistroute::models::{
    Backend, BackendKind, Capability, ModelSelector, ModelSpec, ProviderRegistry,
    meets_constraints,
};
use assistroute::router::{RoutingConstraints, SelectionStrategy};
use proptest::prelude::*;
use std::str::FromStr;
use std::sync::Arc;

fn registry_from_toml(toml: &str) -> Arc<ProviderRegistry> {
    let config = Config::from_str(toml).expect("test config should be valid");
    Arc::new(ProviderRegistry::from_config(&config).expect("registry should build"))
}

const MIXED_BACKENDS: &str = r#"
[[backends]]
id = "local-small"
kind = "local"
weight = 1.0
capabilities = ["streaming"]
[[backends.models]]
name = "small"

[[backends]]
id = "remote-tools"
kind = "remote"
weight = 3.0
capabilities = ["streaming", "function_calling"]
[[backends.models]]
name = "tools"

[[backends]]
id = "local-big"
kind = "local"
weight = 2.0
capabilities = ["function_calling"]
[[backends.models]]
name = "big"
[[backends.models]]
name = "big-alt"
"#;

#[test]
fn test_unconstrained_request_takes_highest_weight() {
    let selector = ModelSelector::new(registry_from_toml(MIXED_BACKENDS));

    let decision = selector
        .select_for(&RoutingConstraints::default())
        .expect("selection should succeed");

    assert_eq!(decision.backend().id().as_str(), "remote-tools");
    assert_eq!(decision.model().name(), "tools");
    assert_eq!(selector.selection_count(), 1);
}

#[test]
fn test_local_constraint_excludes_heavier_remote_backend() {
    let selector = ModelSelector::new(registry_from_toml(MIXED_BACKENDS));

    let decision = selector
        .select_for(&RoutingConstraints::default().local())
        .unwrap();

    assert_eq!(decision.backend().id().as_str(), "local-big");
    assert_eq!(
        decision.model().name(),
        "big",
        "first declared model is used"
    );
}

#[test]
fn test_combined_constraints_narrow_to_single_backend() {
    let selector = ModelSelector::new(registry_from_toml(MIXED_BACKENDS));

    let decision = selector
        .select_for(&RoutingConstraints::default().local().streaming())
        .unwrap();

    assert_eq!(decision.backend().id().as_str(), "local-small");
}

#[test]
fn test_unsatisfiable_constraints_report_no_eligible_provider() {
    let selector = ModelSelector::new(registry_from_toml(MIXED_BACKENDS));
    let constraints = RoutingConstraints::default()
        .local()
        .streaming()
        .function_calling();

    let err = selector.select_for(&constraints).unwrap_err();

    match err {
        AppError::NoEligibleProvider { constraints: got } => assert_eq!(got, constraints),
        other => panic!("expected NoEligibleProvider, got {:?}", other),
    }
    assert_eq!(selector.selection_count(), 0);
}

#[test]
fn test_local_first_prefers_local_over_weight() {
    let selector = ModelSelector::with_strategy(
        registry_from_toml(MIXED_BACKENDS),
        SelectionStrategy::LocalFirst,
    );

    let decision = selector.select_for(&RoutingConstraints::default()).unwrap();

    assert_eq!(decision.backend().id().as_str(), "local-big");
    assert!(
        decision
            .reasons()
            .iter()
            .any(|r| r.contains("local_first")),
        "reasons should name the strategy: {:?}",
        decision.reasons()
    );
}

#[test]
fn test_equal_weights_keep_registration_order() {
    let mut registry = ProviderRegistry::new();
    for id in ["first", "second", "third"] {
        registry
            .register(
                Backend::new(id, BackendKind::Remote)
                    .with_weight(1.5)
                    .with_model(ModelSpec::new("m")),
            )
            .unwrap();
    }
    let selector = ModelSelector::new(Arc::new(registry));

    for _ in 0..10 {
        let decision = selector.select_for(&RoutingConstraints::default()).unwrap();
        assert_eq!(decision.backend().id().as_str(), "first");
    }
}

#[test]
fn test_each_decision_gets_a_fresh_id() {
    let selector = ModelSelector::new(registry_from_toml(MIXED_BACKENDS));

    let a = selector.select_for(&RoutingConstraints::default()).unwrap();
    let b = selector.select_for(&RoutingConstraints::default()).unwrap();

    assert_ne!(a.id(), b.id());
    assert_eq!(a.backend().id(), b.backend().id());
}

// ─────────────────────────────────────────────────────────────────────────────
// Property tests
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct GeneratedBackend {
    local: bool,
    streaming: bool,
    function_calling: bool,
    weight: f64,
}

fn generated_backend() -> impl Strategy<Value = GeneratedBackend> {
    (any::<bool>(), any::<bool>(), any::<bool>(), 0.1f64..10.0).prop_map(
        |(local, streaming, function_calling, weight)| GeneratedBackend {
            local,
            streaming,
            function_calling,
            weight,
        },
    )
}

fn build_registry(backends: &[GeneratedBackend]) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for (i, spec) in backends.iter().enumerate() {
        let kind = if spec.local {
            BackendKind::Local
        } else {
            BackendKind::Remote
        };
        let mut backend = Backend::new(format!("backend-{}", i), kind)
            .with_weight(spec.weight)
            .with_model(ModelSpec::new(format!("model-{}", i)));
        if spec.streaming {
            backend = backend.with_capability(Capability::Streaming);
        }
        if spec.function_calling {
            backend = backend.with_capability(Capability::FunctionCalling);
        }
        registry.register(backend).unwrap();
    }
    registry
}

proptest! {
    #[test]
    fn selected_backend_always_meets_constraints(
        backends in prop::collection::vec(generated_backend(), 1..12),
        require_local in any::<bool>(),
        require_streaming in any::<bool>(),
        require_function_calling in any::<bool>(),
    ) {
        let constraints = RoutingConstraints {
            require_local,
            require_streaming,
            require_function_calling,
        };
        let registry = Arc::new(build_registry(&backends));
        let any_eligible = registry
            .backends()
            .iter()
            .any(|b| meets_constraints(b, &constraints));
        let selector = ModelSelector::new(Arc::clone(&registry));

        match selector.select_for(&constraints) {
            Ok(decision) => {
                prop_assert!(any_eligible);
                prop_assert!(meets_constraints(decision.backend(), &constraints));

                let max_weight = registry
                    .backends()
                    .iter()
                    .filter(|b| meets_constraints(b, &constraints))
                    .map(|b| b.weight())
                    .fold(f64::MIN, f64::max);
                prop_assert_eq!(decision.backend().weight(), max_weight);
            }
            Err(AppError::NoEligibleProvider { .. }) => prop_assert!(!any_eligible),
            Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
        }
    }
}
