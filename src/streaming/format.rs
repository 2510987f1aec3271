//! Output rendering
//!
//! Renders a response payload as JSON, YAML or Markdown. YAML support is an
//! optional build feature; without it, asking for YAML fails with
//! [`AppError::DependencyMissing`] instead of degrading silently.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Rendering target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    #[serde(alias = "yml")]
    Yaml,
    #[serde(alias = "md")]
    Markdown,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Markdown => "markdown",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown names fall back to JSON
impl FromStr for OutputFormat {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "yaml" | "yml" => OutputFormat::Yaml,
            "markdown" | "md" => OutputFormat::Markdown,
            other => {
                tracing::debug!(format = %other, "Unknown output format, using json");
                OutputFormat::Json
            }
        })
    }
}

/// Data handed to the formatter
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Free text; Markdown passes it through untouched
    Text(String),
    Structured(Value),
}

impl Payload {
    /// Serialize any value into a structured payload
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> AppResult<Self> {
        serde_json::to_value(value)
            .map(Payload::Structured)
            .map_err(|e| AppError::Internal(format!("failed to serialize payload: {}", e)))
    }

    fn to_value(&self) -> Value {
        match self {
            Payload::Text(text) => Value::String(text.clone()),
            Payload::Structured(value) => value.clone(),
        }
    }
}

/// Stateless payload renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatTransformer;

impl FormatTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Render `payload` as `format`
    pub fn to(&self, format: OutputFormat, payload: &Payload) -> AppResult<String> {
        match format {
            OutputFormat::Json => pretty_json(&payload.to_value()),
            OutputFormat::Yaml => to_yaml(&payload.to_value()),
            OutputFormat::Markdown => match payload {
                Payload::Text(text) => Ok(text.clone()),
                Payload::Structured(value) => Ok(format!("```json\n{}\n```", pretty_json(value)?)),
            },
        }
    }
}

fn pretty_json(value: &Value) -> AppResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Internal(format!("failed to render json: {}", e)))
}

#[cfg(feature = "yaml")]
fn to_yaml(value: &Value) -> AppResult<String> {
    serde_yaml::to_string(value)
        .map_err(|e| AppError::Internal(format!("failed to render yaml: {}", e)))
}

#[cfg(not(feature = "yaml"))]
fn to_yaml(_value: &Value) -> AppResult<String> {
    Err(AppError::DependencyMissing {
        format: "yaml",
        hint: "this build has no YAML support; rebuild with `--features yaml`".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_format_falls_back_to_json() {
        assert_eq!("toml".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("MD".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("yml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
    }

    #[test]
    fn test_json_is_pretty_printed() {
        let out = FormatTransformer::new()
            .to(OutputFormat::Json, &Payload::Structured(json!({"a": 1})))
            .unwrap();
        assert_eq!(out, "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_json_of_text_is_a_string_literal() {
        let out = FormatTransformer::new()
            .to(OutputFormat::Json, &Payload::Text("hi".to_string()))
            .unwrap();
        assert_eq!(out, "\"hi\"");
    }

    #[test]
    fn test_markdown_text_passes_through() {
        let out = FormatTransformer::new()
            .to(OutputFormat::Markdown, &Payload::Text("# Title".to_string()))
            .unwrap();
        assert_eq!(out, "# Title");
    }

    #[test]
    fn test_markdown_structured_is_fenced_json() {
        let out = FormatTransformer::new()
            .to(OutputFormat::Markdown, &Payload::Structured(json!({"k": "v"})))
            .unwrap();
        assert_eq!(out, "```json\n{\n  \"k\": \"v\"\n}\n```");
    }

    #[cfg(not(feature = "yaml"))]
    #[test]
    fn test_yaml_without_feature_reports_missing_dependency() {
        let err = FormatTransformer::new()
            .to(OutputFormat::Yaml, &Payload::Structured(json!({"k": 1})))
            .unwrap_err();
        assert!(matches!(err, AppError::DependencyMissing { format: "yaml", .. }));
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_yaml_renders_mapping() {
        let out = FormatTransformer::new()
            .to(OutputFormat::Yaml, &Payload::Structured(json!({"k": 1})))
            .unwrap();
        assert_eq!(out.trim(), "k: 1");
    }
}
