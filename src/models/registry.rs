//! Provider registry
//!
//! Owner-held store of backend descriptors plus the ordered fallback chain.
//! The registry is built once (usually from [`Config`]) and then shared
//! read-only behind an `Arc`; mutation requires `&mut self`, so concurrent
//! readers never observe a half-applied registration.

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::backend::{Backend, BackendId};
use std::collections::HashMap;
use std::sync::Arc;

/// Keyed store of backends in registration order
#[derive(Debug, Default, Clone)]
pub struct ProviderRegistry {
    backends: Vec<Arc<Backend>>,
    index: HashMap<BackendId, usize>,
    fallback_chain: Vec<BackendId>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from validated configuration
    ///
    /// Backends are registered in file order. The fallback chain is taken from
    /// `routing.fallback_chain` when present, otherwise it is the registration
    /// order.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let mut registry = Self::new();
        for backend in &config.backends {
            registry.register(backend.clone())?;
        }

        let chain: Vec<BackendId> = match config.routing.fallback_chain() {
            Some(chain) => chain.to_vec(),
            None => registry.ids().cloned().collect(),
        };
        registry.set_fallback_chain(chain)?;

        tracing::info!(
            backends = registry.len(),
            fallback_chain = ?registry.fallback_chain,
            "Provider registry initialized"
        );

        Ok(registry)
    }

    /// Register a backend
    ///
    /// Re-registering an existing id replaces the descriptor but keeps its
    /// original registration position, so tie-breaking stays stable.
    pub fn register(&mut self, backend: Backend) -> AppResult<()> {
        backend.validate().map_err(AppError::Config)?;

        let id = backend.id().clone();
        match self.index.get(&id) {
            Some(&position) => {
                tracing::debug!(backend = %id, "Replacing registered backend");
                self.backends[position] = Arc::new(backend);
            }
            None => {
                tracing::debug!(
                    backend = %id,
                    kind = backend.kind().as_str(),
                    weight = backend.weight(),
                    "Registering backend"
                );
                self.index.insert(id, self.backends.len());
                self.backends.push(Arc::new(backend));
            }
        }
        Ok(())
    }

    /// Look up a backend by id
    pub fn get(&self, id: &BackendId) -> Option<Arc<Backend>> {
        self.index
            .get(id)
            .map(|&position| Arc::clone(&self.backends[position]))
    }

    /// Copy of the fallback chain
    pub fn fallback_chain(&self) -> Vec<BackendId> {
        self.fallback_chain.clone()
    }

    /// Replace the fallback chain wholesale
    ///
    /// # Errors
    /// Returns `AppError::UnknownBackend` if any id is not registered; the
    /// previous chain is kept in that case.
    pub fn set_fallback_chain(&mut self, ids: Vec<BackendId>) -> AppResult<()> {
        if let Some(unknown) = ids.iter().find(|id| !self.index.contains_key(*id)) {
            return Err(AppError::UnknownBackend(unknown.to_string()));
        }
        self.fallback_chain = ids;
        Ok(())
    }

    /// All backends in registration order
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// All ids in registration order
    pub fn ids(&self) -> impl Iterator<Item = &BackendId> {
        self.backends.iter().map(|b| b.id())
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
