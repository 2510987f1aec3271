//! assistroute - backend routing and streamed output assembly for a CLI coding assistant
//!
//! Selects a language-model backend per request under capability constraints,
//! rotates through fallbacks on failure, assembles streamed output under a
//! hard size ceiling with context-aware truncation, and augments prompts with
//! cached lexical or semantic search results.

pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod router;
pub mod search;
pub mod streaming;
pub mod telemetry;
