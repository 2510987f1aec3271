//! Backend descriptors
//!
//! A backend is an addressable language-model endpoint described by its kind,
//! weight, capability flags and the models it serves. The routing core never
//! talks to a backend directly; it only reads these descriptors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Type-safe wrapper for backend ids
///
/// Used as the key of the registry, in fallback chains and in exclusion
/// lists. Construction does not validate against a registry; unknown ids
/// surface as `AppError::UnknownBackend` at lookup time.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BackendId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for BackendId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Where a backend runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// Capability flags a backend may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Streaming,
    FunctionCalling,
    Vision,
    Embeddings,
    CodeCompletion,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::FunctionCalling => "function_calling",
            Self::Vision => "vision",
            Self::Embeddings => "embeddings",
            Self::CodeCompletion => "code_completion",
        }
    }
}

/// A model served by a backend
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModelSpec {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context_window: Option<u32>,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context_window: None,
        }
    }

    pub fn with_context_window(mut self, tokens: u32) -> Self {
        self.context_window = Some(tokens);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context_window(&self) -> Option<u32> {
        self.context_window
    }
}

/// Backend descriptor
///
/// Fields are private so a registered descriptor cannot be mutated in place;
/// changing a backend means registering a new descriptor under the same id.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Backend {
    id: BackendId,
    kind: BackendKind,
    #[serde(default = "default_weight")]
    weight: f64,
    #[serde(default)]
    capabilities: BTreeSet<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    estimated_latency_ms: Option<f64>,
    #[serde(default)]
    models: Vec<ModelSpec>,
}

fn default_weight() -> f64 {
    1.0
}

impl Backend {
    /// Create a backend with default weight, no capabilities and no models
    pub fn new(id: impl Into<BackendId>, kind: BackendKind) -> Self {
        Self {
            id: id.into(),
            kind,
            weight: default_weight(),
            capabilities: BTreeSet::new(),
            estimated_latency_ms: None,
            models: Vec::new(),
        }
    }

    /// Set the preference weight
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Declare a capability
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Append a model (declaration order is preserved)
    pub fn with_model(mut self, model: ModelSpec) -> Self {
        self.models.push(model);
        self
    }

    /// Set the expected latency used for routing observability
    pub fn with_estimated_latency_ms(mut self, latency_ms: f64) -> Self {
        self.estimated_latency_ms = Some(latency_ms);
        self
    }

    pub fn id(&self) -> &BackendId {
        &self.id
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn is_local(&self) -> bool {
        self.kind == BackendKind::Local
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn estimated_latency_ms(&self) -> Option<f64> {
        self.estimated_latency_ms
    }

    pub fn models(&self) -> &[ModelSpec] {
        &self.models
    }

    /// First declared model, the one selection hands out
    pub fn primary_model(&self) -> Option<&ModelSpec> {
        self.models.first()
    }

    /// Check descriptor invariants
    ///
    /// Called by the registry on every registration and by config validation.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.as_str().trim().is_empty() {
            return Err("backend id must not be empty".to_string());
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(format!(
                "backend '{}' has invalid weight {}. Weight must be a positive finite number.",
                self.id, self.weight
            ));
        }
        if self.models.is_empty() {
            return Err(format!(
                "backend '{}' declares no models. At least one [[backends.models]] entry is required.",
                self.id
            ));
        }
        if let Some(latency) = self.estimated_latency_ms {
            if !latency.is_finite() || latency < 0.0 {
                return Err(format!(
                    "backend '{}' has invalid estimated_latency_ms {}",
                    self.id, latency
                ));
            }
        }
        Ok(())
    }
}
