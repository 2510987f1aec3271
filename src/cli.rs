//! Command-line interface for assistroute
//!
//! Provides argument parsing, subcommand output rendering and the config
//! template for the assistroute binary.

use crate::config::DEFAULT_CONFIG_PATH;
use crate::error::AppResult;
use crate::models::{Backend, ProviderRegistry};
use crate::router::{RoutingConstraints, RoutingDecision};
use crate::streaming::{FormatTransformer, OutputFormat, Payload};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;

/// Backend routing for a CLI coding assistant
#[derive(Parser)]
#[command(name = "assistroute")]
#[command(version)]
#[command(about = "Backend routing, streaming assembly and cached context retrieval")]
#[command(
    long_about = "assistroute selects a language-model backend for each request under \
    capability constraints, rotates through fallbacks when a backend fails, and assembles \
    streamed output under a hard size ceiling."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Load and validate the configuration, then list backends (default)
    Check,

    /// Show which backend a request with these constraints would be routed to
    Route {
        /// Only consider local backends
        #[arg(long)]
        local: bool,

        /// Only consider backends that support streaming
        #[arg(long)]
        streaming: bool,

        /// Only consider backends that support function calling
        #[arg(long)]
        function_calling: bool,

        /// Output format: json, yaml or markdown (unknown values use json)
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Show the next fallback candidates for a backend
    Fallbacks {
        /// Backend currently failing
        #[arg(long)]
        current: String,

        /// Number of candidates (defaults to routing.fallback_candidates)
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
}

impl Command {
    /// Constraints carried by a `route` command
    pub fn constraints(&self) -> Option<RoutingConstraints> {
        match self {
            Command::Route {
                local,
                streaming,
                function_calling,
                ..
            } => Some(RoutingConstraints {
                require_local: *local,
                require_streaming: *streaming,
                require_function_calling: *function_calling,
            }),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct BackendSummary<'a> {
    id: &'a str,
    kind: &'static str,
    weight: f64,
    capabilities: Vec<&'static str>,
    model: Option<&'a str>,
}

impl<'a> From<&'a Backend> for BackendSummary<'a> {
    fn from(backend: &'a Backend) -> Self {
        Self {
            id: backend.id().as_str(),
            kind: backend.kind().as_str(),
            weight: backend.weight(),
            capabilities: backend.capabilities().iter().map(|c| c.as_str()).collect(),
            model: backend.primary_model().map(|m| m.name()),
        }
    }
}

/// Human-readable listing of registered backends and the fallback chain
pub fn describe_registry(registry: &ProviderRegistry) -> String {
    let mut out = format!("{} backend(s) registered\n", registry.len());
    for backend in registry.backends() {
        let summary = BackendSummary::from(backend.as_ref());
        out.push_str(&format!(
            "  {:<16} {:<6} weight={:<6} model={:<24} [{}]\n",
            summary.id,
            summary.kind,
            summary.weight,
            summary.model.unwrap_or("-"),
            summary.capabilities.join(", ")
        ));
    }
    let chain: Vec<String> = registry
        .fallback_chain()
        .iter()
        .map(|id| id.to_string())
        .collect();
    out.push_str(&format!("fallback chain: {}\n", chain.join(" -> ")));
    out
}

/// Render a routing decision in the requested format
pub fn render_decision(decision: &RoutingDecision, format: OutputFormat) -> AppResult<String> {
    FormatTransformer::new().to(format, &Payload::from_serialize(decision)?)
}

/// Render fallback candidates in the requested format
pub fn render_candidates(candidates: &[Arc<Backend>], format: OutputFormat) -> AppResult<String> {
    let summaries: Vec<BackendSummary<'_>> =
        candidates.iter().map(|b| BackendSummary::from(b.as_ref())).collect();
    FormatTransformer::new().to(format, &Payload::from_serialize(&summaries)?)
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# assistroute configuration
# =========================
#
# Declares the language-model backends requests can be routed to, how a
# backend is chosen, how streamed output is bounded, and how retrieved
# context is cached.

# ─────────────────────────────────────────────────────────────────────────────
# BACKENDS
# ─────────────────────────────────────────────────────────────────────────────
#
# Backend fields:
#   - id: unique name, used in logs, metrics and the fallback chain
#   - kind: "local" or "remote"
#   - weight: selection preference (higher wins, default 1.0)
#   - capabilities: any of "streaming", "function_calling", "vision",
#     "embeddings", "code_completion"
#   - estimated_latency_ms: optional, used for latency averages until an
#     observed latency is available
#   - [[backends.models]]: ordered model list; the first one is used

[[backends]]
id = "local-coder"
kind = "local"
weight = 2.0
capabilities = ["streaming", "code_completion"]
estimated_latency_ms = 400.0

[[backends.models]]
name = "your-local-model"
context_window = 32768

[[backends]]
id = "hosted"
kind = "remote"
weight = 1.0
capabilities = ["streaming", "function_calling", "vision"]
estimated_latency_ms = 900.0

[[backends.models]]
name = "your-hosted-model"

# ─────────────────────────────────────────────────────────────────────────────
# ROUTING
# ─────────────────────────────────────────────────────────────────────────────

[routing]
# Selection strategy:
#   - "weighted": highest weight wins, ties keep declaration order
#   - "local_first": local backends ahead of remote ones, then by weight
strategy = "weighted"

# Attempts per request are bounded by the length of this chain.
# Defaults to every backend in declaration order.
fallback_chain = ["local-coder", "hosted"]

# Candidates requested from the load balancer on each fallback
fallback_candidates = 2

# ─────────────────────────────────────────────────────────────────────────────
# STREAMING
# ─────────────────────────────────────────────────────────────────────────────

[streaming]
# Hard ceiling on assembled response size in bytes
max_buffer_bytes = 1048576

# Truncation policy when a request does not set one: "code", "chat", "analysis"
default_context_type = "chat"

# Optional output rendering: "json", "yaml" (needs the yaml feature), "markdown"
# format = "markdown"

# Optional per-context byte limits. They only cut output when they are below
# max_buffer_bytes; a context type without one is bounded by the ceiling.
# Code is cut on a line boundary, chat and analysis on a character boundary.
# [streaming.context_limits]
# code = 65536
# chat = 16384
# analysis = 32768

# ─────────────────────────────────────────────────────────────────────────────
# CONTEXT SEARCH (Optional)
# ─────────────────────────────────────────────────────────────────────────────
#
# Without either setting, cached search results live for the whole process.

[search]
# cache_ttl_seconds = 600
# cache_max_entries = 1000

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error" (RUST_LOG overrides)
log_level = "info"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::ModelSelector;
    use clap::CommandFactory;
    use std::str::FromStr;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_config_path() {
        let cli = Cli::parse_from(["assistroute"]);
        assert_eq!(cli.config, "assistroute.toml");
        assert!(cli.command.is_none());
    }

    #[test]
    fn config_subcommand_with_output() {
        let cli = Cli::parse_from(["assistroute", "config", "-o", "my-config.toml"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config { output: Some(ref path) }) if path == "my-config.toml"
        ));
    }

    #[test]
    fn route_subcommand_flags_become_constraints() {
        let cli = Cli::parse_from([
            "assistroute",
            "route",
            "--local",
            "--function-calling",
            "--format",
            "markdown",
        ]);
        let command = cli.command.expect("subcommand parsed");
        let constraints = command.constraints().expect("route carries constraints");
        assert!(constraints.require_local);
        assert!(!constraints.require_streaming);
        assert!(constraints.require_function_calling);
        assert!(matches!(command, Command::Route { ref format, .. } if format == "markdown"));
    }

    #[test]
    fn fallbacks_subcommand() {
        let cli = Cli::parse_from(["assistroute", "fallbacks", "--current", "a", "-n", "3"]);
        assert!(matches!(
            cli.command,
            Some(Command::Fallbacks { ref current, count: Some(3) }) if current == "a"
        ));
    }

    #[test]
    fn template_is_a_valid_config() {
        let config = Config::from_str(generate_config_template())
            .expect("template should parse and validate");
        assert_eq!(config.backends.len(), 2);
    }

    #[test]
    fn describe_lists_backends_and_chain() {
        let config = Config::from_str(generate_config_template()).unwrap();
        let registry = ProviderRegistry::from_config(&config).unwrap();
        let text = describe_registry(&registry);
        assert!(text.starts_with("2 backend(s) registered"));
        assert!(text.contains("local-coder"));
        assert!(text.contains("fallback chain: local-coder -> hosted"));
    }

    #[test]
    fn decision_renders_as_json() {
        let config = Config::from_str(generate_config_template()).unwrap();
        let registry = Arc::new(ProviderRegistry::from_config(&config).unwrap());
        let decision = ModelSelector::new(registry)
            .select_for(&RoutingConstraints::default())
            .unwrap();

        let json = render_decision(&decision, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["backend"]["id"], "local-coder");
        assert_eq!(value["model"]["name"], "your-local-model");
    }
}
