//! Request routing with fallback
//!
//! Composition point: optional context augmentation, selection, backend
//! invocation, bounded stream assembly. A backend that fails (at invocation
//! or mid-stream) is replaced by the next rotation candidate from the
//! [`LoadBalancer`]; partial output from the failed attempt is discarded.
//! The number of attempts is bounded by the fallback chain length.

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics::{Metrics, Outcome};
use crate::models::{
    Backend, BackendId, DEFAULT_FALLBACK_CANDIDATES, LoadBalancer, ModelSelector,
    ProviderRegistry, meets_constraints,
};
use crate::router::tracker::PerformanceTracker;
use crate::router::{
    RequestPhase, RoutingConstraints, RoutingDecision, RoutingRequest, SelectionStrategy,
};
use crate::search::HybridSearchCoordinator;
use crate::streaming::{
    AssembledOutput, ChunkSource, ContextLimits, ContextType, DEFAULT_MAX_BUFFER_BYTES,
    OutputCoordinator, OutputFormat, OutputOptions, StreamChunk,
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// The opaque backend call
///
/// Implementations own transport, authentication and timeouts. The returned
/// source must honour `close()`.
#[async_trait]
pub trait BackendInvoker: Send + Sync {
    async fn invoke(
        &self,
        decision: &RoutingDecision,
        prompt: &str,
    ) -> AppResult<Box<dyn ChunkSource>>;
}

/// Router tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterSettings {
    pub strategy: SelectionStrategy,
    /// Candidates requested from the load balancer per fallback
    pub fallback_candidates: usize,
    pub max_buffer_bytes: usize,
    /// Applied below `max_buffer_bytes`; unset types use the ceiling alone
    pub context_limits: ContextLimits,
    pub default_context_type: ContextType,
    pub default_format: Option<OutputFormat>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::default(),
            fallback_candidates: DEFAULT_FALLBACK_CANDIDATES,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            context_limits: ContextLimits::default(),
            default_context_type: ContextType::default(),
            default_format: None,
        }
    }
}

impl RouterSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            strategy: config.routing.strategy(),
            fallback_candidates: config.routing.fallback_candidates(),
            max_buffer_bytes: config.streaming.max_buffer_bytes(),
            context_limits: config.streaming.context_limits(),
            default_context_type: config.streaming.default_context_type(),
            default_format: config.streaming.format(),
        }
    }
}

/// A successfully routed and assembled response
#[derive(Debug, Clone, Serialize)]
pub struct RoutedResponse {
    /// Decision of the attempt that succeeded
    pub decision: RoutingDecision,
    /// Backends tried, in order, ending with the one that succeeded
    pub attempts: Vec<BackendId>,
    pub text: String,
    pub rendered: String,
    pub truncated: bool,
    pub size_bytes: usize,
    pub phases: Vec<RequestPhase>,
}

pub struct RequestRouter {
    registry: Arc<ProviderRegistry>,
    selector: ModelSelector,
    balancer: LoadBalancer,
    tracker: Arc<PerformanceTracker>,
    invoker: Arc<dyn BackendInvoker>,
    coordinator: OutputCoordinator,
    search: Option<Arc<HybridSearchCoordinator>>,
    metrics: Option<Arc<Metrics>>,
    settings: RouterSettings,
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRouter")
            .field("backends", &self.registry.len())
            .field("settings", &self.settings)
            .field("has_search", &self.search.is_some())
            .finish_non_exhaustive()
    }
}

impl RequestRouter {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        invoker: Arc<dyn BackendInvoker>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            selector: ModelSelector::with_strategy(Arc::clone(&registry), settings.strategy),
            balancer: LoadBalancer::new(Arc::clone(&registry)),
            tracker: Arc::new(PerformanceTracker::new()),
            coordinator: output_coordinator(&settings),
            registry,
            invoker,
            search: None,
            metrics: None,
            settings,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.coordinator = output_coordinator(&self.settings).with_metrics(Arc::clone(&metrics));
        self.metrics = Some(metrics);
        self
    }

    pub fn with_search(mut self, search: Arc<HybridSearchCoordinator>) -> Self {
        self.search = Some(search);
        self
    }

    /// Share a tracker across routers
    pub fn with_tracker(mut self, tracker: Arc<PerformanceTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn tracker(&self) -> &Arc<PerformanceTracker> {
        &self.tracker
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Route a request and assemble the response
    pub async fn route(&self, request: &RoutingRequest) -> AppResult<RoutedResponse> {
        self.route_observed(request, None).await
    }

    /// Like [`route`](Self::route), forwarding every raw chunk to `observer`
    ///
    /// The observer also sees chunks of attempts that later fail.
    pub async fn route_observed(
        &self,
        request: &RoutingRequest,
        mut observer: Option<&mut (dyn FnMut(&StreamChunk) + Send)>,
    ) -> AppResult<RoutedResponse> {
        let mut phases = vec![RequestPhase::Init];

        let prompt = self.augment_prompt(request).await?;

        enter(&mut phases, RequestPhase::Selecting);
        let mut decision = self.selector.select(request)?;

        let options = OutputOptions {
            context_type: request
                .context_type
                .unwrap_or(self.settings.default_context_type),
            format: request.format.or(self.settings.default_format),
        };
        let max_attempts = self.registry.fallback_chain().len().max(1);
        let mut attempted: Vec<BackendId> = Vec::with_capacity(max_attempts);
        let mut last_error: Option<AppError> = None;

        loop {
            let backend_id = decision.backend().id().clone();
            attempted.push(backend_id.clone());
            self.tracker.record_decision(decision.clone()).await;

            tracing::info!(
                decision_id = %decision.id(),
                backend = %backend_id,
                model = %decision.model().name(),
                attempt = attempted.len(),
                max_attempts = max_attempts,
                "Routing request to backend"
            );

            enter(&mut phases, RequestPhase::Streaming);
            let started = Instant::now();
            // Reborrow with a per-attempt object lifetime
            let attempt_observer = observer
                .as_mut()
                .map(|o| &mut **o as &mut (dyn FnMut(&StreamChunk) + Send));
            let outcome = self
                .attempt(&decision, &prompt, &options, attempt_observer)
                .await;
            self.tracker
                .record_latency(decision.id(), started.elapsed())
                .await;

            match outcome {
                Ok(output) => {
                    self.record_outcome(&backend_id, Outcome::Success);

                    enter(&mut phases, RequestPhase::Assembling);
                    enter(
                        &mut phases,
                        if output.truncated {
                            RequestPhase::Truncated
                        } else {
                            RequestPhase::Complete
                        },
                    );
                    if options.format.is_some() {
                        enter(&mut phases, RequestPhase::Formatting);
                    }
                    enter(&mut phases, RequestPhase::Done);

                    tracing::info!(
                        decision_id = %decision.id(),
                        backend = %backend_id,
                        attempts = attempted.len(),
                        size_bytes = output.size_bytes,
                        truncated = output.truncated,
                        "Request completed"
                    );

                    return Ok(RoutedResponse {
                        decision,
                        attempts: attempted,
                        text: output.text,
                        rendered: output.rendered,
                        truncated: output.truncated,
                        size_bytes: output.size_bytes,
                        phases,
                    });
                }
                Err(e) if e.is_backend_failure() => {
                    self.record_outcome(&backend_id, Outcome::Failure);
                    tracing::warn!(
                        backend = %backend_id,
                        attempt = attempted.len(),
                        max_attempts = max_attempts,
                        error = %e,
                        "Backend attempt failed, discarding partial output"
                    );
                    last_error = Some(e);

                    if attempted.len() >= max_attempts {
                        break;
                    }

                    enter(&mut phases, RequestPhase::FallbackSelection);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_fallback(&backend_id);
                    }
                    match self.next_candidate(&backend_id, &attempted, &request.constraints) {
                        Some(next) => decision = next,
                        None => break,
                    }
                }
                Err(e) => {
                    enter(&mut phases, RequestPhase::Failed);
                    tracing::error!(
                        backend = %backend_id,
                        error = %e,
                        error_type = e.error_type(),
                        "Request failed"
                    );
                    return Err(e);
                }
            }
        }

        enter(&mut phases, RequestPhase::Failed);
        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt was made".to_string());
        tracing::error!(
            constraints = %request.constraints,
            attempted = ?attempted,
            last_error = %last_error,
            "All fallback candidates exhausted"
        );

        Err(AppError::FallbackExhausted {
            constraints: request.constraints,
            attempted: attempted.iter().map(|id| id.as_str().to_string()).collect(),
            last_error,
        })
    }

    async fn attempt(
        &self,
        decision: &RoutingDecision,
        prompt: &str,
        options: &OutputOptions,
        observer: Option<&mut (dyn FnMut(&StreamChunk) + Send)>,
    ) -> AppResult<AssembledOutput> {
        let mut source = self.invoker.invoke(decision, prompt).await?;
        self.coordinator
            .process(source.as_mut(), options, observer)
            .await
    }

    /// First rotation candidate not yet attempted that meets the constraints
    ///
    /// Keeps pulling batches from the balancer, one cursor step each, until a
    /// candidate qualifies. `registry.len()` batches visit every starting
    /// offset, so `None` means no untried backend conforms.
    fn next_candidate(
        &self,
        failed: &BackendId,
        attempted: &[BackendId],
        constraints: &RoutingConstraints,
    ) -> Option<RoutingDecision> {
        let (chosen, model) = (0..self.registry.len().max(1)).find_map(|_| {
            self.balancer
                .get_fallback_providers(failed, self.settings.fallback_candidates)
                .into_iter()
                .filter(|b| !attempted.contains(b.id()) && meets_constraints(b, constraints))
                .find_map(|b: Arc<Backend>| {
                    let model = b.primary_model().cloned()?;
                    Some((b, model))
                })
        })?;

        tracing::info!(
            from = %failed,
            to = %chosen.id(),
            "Falling back to next rotation candidate"
        );

        let reasons = vec![
            format!("fallback after backend '{}' failed", failed),
            format!("next rotation candidate satisfying constraints ({})", constraints),
            format!("using first declared model '{}'", model.name()),
        ];
        Some(RoutingDecision::new(chosen, model, reasons))
    }

    /// Prepend retrieved context to the prompt when a query and a search
    /// coordinator are both present. Search errors propagate.
    async fn augment_prompt(&self, request: &RoutingRequest) -> AppResult<String> {
        let (Some(query), Some(search)) = (&request.context_query, &self.search) else {
            if request.context_query.is_some() {
                tracing::debug!("Context query ignored: no search coordinator configured");
            }
            return Ok(request.prompt.clone());
        };

        let result = search.search(query).await?;
        match result.to_context_block() {
            Some(block) => {
                tracing::debug!(
                    documents = result.documents.len(),
                    method = ?result.metadata.search_method,
                    "Prompt augmented with retrieved context"
                );
                Ok(format!("{}\n{}", block, request.prompt))
            }
            None => Ok(request.prompt.clone()),
        }
    }

    fn record_outcome(&self, backend: &BackendId, outcome: Outcome) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request(backend, outcome);
        }
    }
}

fn output_coordinator(settings: &RouterSettings) -> OutputCoordinator {
    OutputCoordinator::new(settings.max_buffer_bytes).with_context_limits(settings.context_limits)
}

fn enter(phases: &mut Vec<RequestPhase>, phase: RequestPhase) {
    tracing::debug!(phase = ?phase, "Request phase transition");
    phases.push(phase);
}
