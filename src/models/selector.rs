//! Backend selection under capability constraints
//!
//! Filters registered backends by the request's constraints, ranks the
//! eligible set with the configured [`SelectionStrategy`] and hands out the
//! winner together with its first declared model.
//!
//! Selection is a pure function of registry state and request: no I/O, no
//! randomness, no internal retries.

use crate::error::{AppError, AppResult};
use crate::models::backend::{Backend, Capability};
use crate::models::registry::ProviderRegistry;
use crate::router::{RoutingConstraints, RoutingDecision, RoutingRequest, SelectionStrategy};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Check a backend against every active constraint
pub fn meets_constraints(backend: &Backend, constraints: &RoutingConstraints) -> bool {
    if constraints.require_local && !backend.is_local() {
        return false;
    }
    if constraints.require_streaming && !backend.supports(Capability::Streaming) {
        return false;
    }
    if constraints.require_function_calling && !backend.supports(Capability::FunctionCalling) {
        return false;
    }
    true
}

/// Selects the best eligible backend for a request
#[derive(Debug)]
pub struct ModelSelector {
    registry: Arc<ProviderRegistry>,
    strategy: SelectionStrategy,
    // Selection counter for observability
    selections: AtomicUsize,
}

impl ModelSelector {
    /// Create a selector using the weighted strategy
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self::with_strategy(registry, SelectionStrategy::Weighted)
    }

    pub fn with_strategy(registry: Arc<ProviderRegistry>, strategy: SelectionStrategy) -> Self {
        Self {
            registry,
            strategy,
            selections: AtomicUsize::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    /// Number of successful selections since construction
    pub fn selection_count(&self) -> usize {
        self.selections.load(Ordering::Relaxed)
    }

    /// Select a backend and model for the request
    ///
    /// # Errors
    /// Returns `AppError::NoEligibleProvider` carrying the constraints when no
    /// registered backend satisfies them.
    pub fn select(&self, request: &RoutingRequest) -> AppResult<RoutingDecision> {
        self.select_for(&request.constraints)
    }

    /// Select using only the constraints
    pub fn select_for(&self, constraints: &RoutingConstraints) -> AppResult<RoutingDecision> {
        let total = self.registry.len();
        let mut eligible: Vec<&Arc<Backend>> = self
            .registry
            .backends()
            .iter()
            .filter(|b| meets_constraints(b, constraints))
            .collect();

        if eligible.is_empty() {
            tracing::warn!(
                constraints = %constraints,
                registered_backends = total,
                "No backend satisfies routing constraints"
            );
            return Err(AppError::NoEligibleProvider {
                constraints: *constraints,
            });
        }

        let mut reasons = vec![format!(
            "{} of {} backends satisfy constraints ({})",
            eligible.len(),
            total,
            constraints
        )];

        // `sort_by` is stable, so equal keys keep registration order
        match self.strategy {
            SelectionStrategy::Weighted => {
                eligible.sort_by(|a, b| b.weight().total_cmp(&a.weight()));
            }
            SelectionStrategy::LocalFirst => {
                eligible.sort_by(|a, b| {
                    b.is_local()
                        .cmp(&a.is_local())
                        .then_with(|| b.weight().total_cmp(&a.weight()))
                });
            }
        }

        let chosen = Arc::clone(eligible[0]);
        let model = chosen.primary_model().cloned().ok_or_else(|| {
            AppError::Internal(format!("backend '{}' has no models", chosen.id()))
        })?;

        match self.strategy {
            SelectionStrategy::Weighted => reasons.push(format!(
                "highest weight {} among eligible backends",
                chosen.weight()
            )),
            SelectionStrategy::LocalFirst => reasons.push(format!(
                "{} backend ranked first by local_first strategy (weight {})",
                chosen.kind().as_str(),
                chosen.weight()
            )),
        }
        reasons.push(format!("using first declared model '{}'", model.name()));

        self.selections.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            backend = %chosen.id(),
            model = %model.name(),
            strategy = self.strategy.as_str(),
            eligible = eligible.len(),
            "Selected backend"
        );

        Ok(RoutingDecision::new(chosen, model, reasons))
    }
}
