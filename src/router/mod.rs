//! Request routing for assistroute
//!
//! Types shared by the selector, the load balancer and the request router,
//! plus the [`RequestRouter`] composition point itself.

pub mod request_router;
pub mod tracker;

pub use request_router::{BackendInvoker, RequestRouter, RoutedResponse, RouterSettings};
pub use tracker::{PerformanceRecord, PerformanceTracker};

use crate::models::{Backend, ModelSpec};
use crate::search::SearchQuery;
use crate::streaming::{ContextType, OutputFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Capability constraints of a request
///
/// All flags are AND-ed filters; an unset flag does not filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoutingConstraints {
    #[serde(default)]
    pub require_local: bool,
    #[serde(default)]
    pub require_streaming: bool,
    #[serde(default)]
    pub require_function_calling: bool,
}

impl RoutingConstraints {
    /// Only local backends
    pub fn local(mut self) -> Self {
        self.require_local = true;
        self
    }

    /// Only backends declaring streaming
    pub fn streaming(mut self) -> Self {
        self.require_streaming = true;
        self
    }

    /// Only backends declaring function calling
    pub fn function_calling(mut self) -> Self {
        self.require_function_calling = true;
        self
    }

    pub fn is_unconstrained(&self) -> bool {
        !(self.require_local || self.require_streaming || self.require_function_calling)
    }
}

impl fmt::Display for RoutingConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unconstrained() {
            return f.write_str("none");
        }
        let mut parts = Vec::with_capacity(3);
        if self.require_local {
            parts.push("local");
        }
        if self.require_streaming {
            parts.push("streaming");
        }
        if self.require_function_calling {
            parts.push("function_calling");
        }
        f.write_str(&parts.join(", "))
    }
}

/// How the selector ranks eligible backends
///
/// Resolved by a single `match` in `ModelSelector::select`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Highest weight wins, ties keep registration order
    #[default]
    Weighted,
    /// Local backends ahead of remote ones, then by weight
    LocalFirst,
}

impl SelectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weighted => "weighted",
            Self::LocalFirst => "local_first",
        }
    }
}

/// A generation request entering the router
#[derive(Debug, Clone, Default)]
pub struct RoutingRequest {
    pub constraints: RoutingConstraints,
    pub prompt: String,
    /// Optional retrieval query used to enrich the prompt
    pub context_query: Option<SearchQuery>,
    /// Truncation policy; the router default applies when unset
    pub context_type: Option<ContextType>,
    pub format: Option<OutputFormat>,
}

impl RoutingRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_constraints(mut self, constraints: RoutingConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_context_query(mut self, query: SearchQuery) -> Self {
        self.context_query = Some(query);
        self
    }

    pub fn with_context_type(mut self, context_type: ContextType) -> Self {
        self.context_type = Some(context_type);
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }
}

/// Result of one selection attempt
///
/// Produced once and never mutated; a fallback produces a new decision.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    id: Uuid,
    backend: Arc<Backend>,
    model: ModelSpec,
    reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    estimated_latency_ms: Option<f64>,
}

impl RoutingDecision {
    pub(crate) fn new(backend: Arc<Backend>, model: ModelSpec, reasons: Vec<String>) -> Self {
        let estimated_latency_ms = backend.estimated_latency_ms();
        Self {
            id: Uuid::new_v4(),
            backend,
            model,
            reasons,
            estimated_latency_ms,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    pub fn model(&self) -> &ModelSpec {
        &self.model
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn estimated_latency_ms(&self) -> Option<f64> {
        self.estimated_latency_ms
    }
}

/// Lifecycle of one routed and streamed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPhase {
    Init,
    Selecting,
    Streaming,
    Assembling,
    Truncated,
    Complete,
    Formatting,
    Done,
    FallbackSelection,
    Failed,
}
