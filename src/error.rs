//! Error types for assistroute
//!
//! Every fallible operation in the crate returns [`AppResult`]. Stream-level
//! failures keep their own [`StreamError`] so the cancellation signal can be
//! told apart from a real producer failure before it is folded in here.

use crate::router::RoutingConstraints;
use crate::streaming::StreamError;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file '{path}': {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("No registered backend satisfies constraints ({constraints})")]
    NoEligibleProvider { constraints: RoutingConstraints },

    #[error("Unknown backend: '{0}'")]
    UnknownBackend(String),

    #[error("Backend '{backend}' failed: {reason}")]
    BackendInvocation { backend: String, reason: String },

    #[error(
        "All fallback candidates exhausted for constraints ({constraints}); tried [{}]; last error: {last_error}",
        .attempted.join(", ")
    )]
    FallbackExhausted {
        constraints: RoutingConstraints,
        attempted: Vec<String>,
        last_error: String,
    },

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("Cannot render {format} output: {hint}")]
    DependencyMissing { format: &'static str, hint: String },

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short, bounded label for metrics and structured logs
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Config(_)
            | Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. } => "config",
            Self::NoEligibleProvider { .. } => "no_eligible_provider",
            Self::UnknownBackend(_) => "unknown_backend",
            Self::BackendInvocation { .. } => "backend_invocation",
            Self::FallbackExhausted { .. } => "fallback_exhausted",
            Self::Stream(_) => "stream",
            Self::DependencyMissing { .. } => "dependency_missing",
            Self::Search(_) => "search",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the router should move on to the next fallback candidate
    ///
    /// Only failures of the backend itself (invocation or mid-stream) qualify.
    /// Selection exhaustion and formatter errors are terminal for the request.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::BackendInvocation { .. } | Self::Stream(_))
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
