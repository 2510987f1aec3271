//! Configuration management for assistroute
//!
//! Parses TOML configuration files and provides typed access to settings.

use crate::error::{AppError, AppResult};
use crate::models::{Backend, BackendId, DEFAULT_FALLBACK_CANDIDATES};
use crate::router::SelectionStrategy;
use crate::search::CacheConfig;
use crate::streaming::{ContextLimits, ContextType, DEFAULT_MAX_BUFFER_BYTES, OutputFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "assistroute.toml";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backends: Vec<Backend>,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Routing configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RoutingConfig {
    #[serde(default)]
    strategy: SelectionStrategy,
    /// Ordered fallback chain; its length bounds attempts per request.
    /// Registration order when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fallback_chain: Option<Vec<BackendId>>,
    #[serde(default = "default_fallback_candidates")]
    fallback_candidates: usize,
}

fn default_fallback_candidates() -> usize {
    DEFAULT_FALLBACK_CANDIDATES
}

impl RoutingConfig {
    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    pub fn fallback_chain(&self) -> Option<&[BackendId]> {
        self.fallback_chain.as_deref()
    }

    pub fn fallback_candidates(&self) -> usize {
        self.fallback_candidates
    }
}

/// Streaming and output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    #[serde(default = "default_max_buffer_bytes")]
    max_buffer_bytes: usize,
    #[serde(default)]
    default_context_type: ContextType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    format: Option<OutputFormat>,
    /// Per-context limits; unset types are bounded by `max_buffer_bytes` alone
    #[serde(default)]
    context_limits: ContextLimits,
}

fn default_max_buffer_bytes() -> usize {
    DEFAULT_MAX_BUFFER_BYTES
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            max_buffer_bytes: default_max_buffer_bytes(),
            default_context_type: ContextType::default(),
            format: None,
            context_limits: ContextLimits::default(),
        }
    }
}

impl StreamingConfig {
    pub fn max_buffer_bytes(&self) -> usize {
        self.max_buffer_bytes
    }

    pub fn default_context_type(&self) -> ContextType {
        self.default_context_type
    }

    pub fn format(&self) -> Option<OutputFormat> {
        self.format
    }

    pub fn context_limits(&self) -> ContextLimits {
        self.context_limits
    }
}

/// Search cache retention
///
/// Both settings are optional: with neither set the cache keeps every entry
/// for the life of the process.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cache_ttl_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cache_max_entries: Option<usize>,
}

impl SearchConfig {
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_seconds.map(Duration::from_secs)
    }

    pub fn cache_max_entries(&self) -> Option<usize> {
        self.cache_max_entries
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: self.cache_ttl(),
            max_entries: self.cache_max_entries,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let config: Self = toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
            path: path_display.clone(),
            source,
        })?;

        // Phase 3: Validate parsed config
        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        tracing::debug!(
            backends = config.backends.len(),
            strategy = config.routing.strategy().as_str(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate configuration after parsing
    ///
    /// Called by `from_file()` and `from_str()`; call it explicitly when a
    /// Config is assembled by other means.
    pub fn validate(&self) -> AppResult<()> {
        if self.backends.is_empty() {
            return Err(AppError::Config(
                "at least one [[backends]] entry is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            backend.validate().map_err(AppError::Config)?;
            if !seen.insert(backend.id()) {
                return Err(AppError::Config(format!(
                    "duplicate backend id '{}'. Backend ids must be unique.",
                    backend.id()
                )));
            }
        }

        if let Some(chain) = self.routing.fallback_chain() {
            if let Some(unknown) = chain.iter().find(|id| !seen.contains(id)) {
                return Err(AppError::Config(format!(
                    "routing.fallback_chain references unknown backend '{}'",
                    unknown
                )));
            }
        }

        if self.routing.fallback_candidates() == 0 {
            return Err(AppError::Config(
                "routing.fallback_candidates must be at least 1".to_string(),
            ));
        }

        if self.streaming.max_buffer_bytes() == 0 {
            return Err(AppError::Config(
                "streaming.max_buffer_bytes must be greater than 0".to_string(),
            ));
        }

        let limits = self.streaming.context_limits();
        for context_type in [ContextType::Code, ContextType::Chat, ContextType::Analysis] {
            if limits.get(context_type) == Some(0) {
                return Err(AppError::Config(format!(
                    "streaming.context_limits.{} must be greater than 0 when set",
                    context_type
                )));
            }
        }

        if self.search.cache_max_entries() == Some(0) {
            return Err(AppError::Config(
                "search.cache_max_entries must be greater than 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}
