//! Runtime configuration.
//!
//! Loaded from YAML or JSON, then overridden from the environment:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `OLLAMA_API_URL` | `provider_options.base_url` |
//! | `OLLAMA_MODEL` | `model` |
//!
//! The optional gateway token (`ATTESTOR_API_KEY`) is read by the
//! provider itself so it never lands in this struct.
//!
//! ```yaml
//! provider: ollama
//! provider_options:
//!   base_url: http://localhost:11434
//! model: llama3.2
//! timeout: 60s
//! max_concurrency: 4
//! fallback: keyword_overlap
//! circuit_breaker:
//!   failure_threshold: 3
//!   recovery_timeout: 30s
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::client::DEFAULT_EXCERPT_CHARS;
use crate::providers::{CompletionConfig, DEFAULT_MODEL};
use crate::resilience::{CircuitBreakerConfig, FallbackStrategy};

/// Environment variable overriding the service URL.
pub const OLLAMA_API_URL_ENV: &str = "OLLAMA_API_URL";

/// Environment variable overriding the model name.
pub const OLLAMA_MODEL_ENV: &str = "OLLAMA_MODEL";

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format: {0} (expected .json, .yaml or .yml)")]
    UnsupportedFormat(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration for the review engine and its generative client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Provider type in the registry
    pub provider: String,

    /// Provider-specific options (`base_url`, `api_key`, ...)
    pub provider_options: JsonValue,

    /// Model identifier sent with each request
    pub model: String,

    /// Sampling temperature; low values keep judgments stable
    pub temperature: f32,

    /// Maximum tokens generated per judgment
    pub max_tokens: u32,

    /// Per-call timeout ("60s", "1m 30s" or seconds)
    #[serde(with = "human_duration")]
    pub timeout: Duration,

    /// Leading characters of the document sent to the service
    pub excerpt_chars: usize,

    /// Rules evaluated at once; 1 keeps strict rule-set order of calls
    pub max_concurrency: usize,

    /// Resolution for unavailable services and unreadable responses
    pub fallback: FallbackStrategy,

    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            provider_options: JsonValue::Object(serde_json::Map::new()),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 512,
            timeout: Duration::from_secs(60),
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            max_concurrency: 1,
            fallback: FallbackStrategy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a config file, choosing the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "json" => Self::from_json(&fs::read_to_string(path)?),
            "yaml" | "yml" => Self::from_yaml(&fs::read_to_string(path)?),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// File (or defaults), then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `OLLAMA_API_URL` / `OLLAMA_MODEL` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_blank(OLLAMA_API_URL_ENV) {
            if !self.provider_options.is_object() {
                self.provider_options = JsonValue::Object(serde_json::Map::new());
            }
            self.provider_options["base_url"] = JsonValue::String(url);
        }
        if let Some(model) = non_blank(OLLAMA_MODEL_ENV) {
            self.model = model;
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.trim().is_empty() {
            return Err(ConfigError::Invalid("provider must not be empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be greater than zero".to_string()));
        }
        if self.excerpt_chars == 0 {
            return Err(ConfigError::Invalid("excerpt_chars must be at least 1".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid("max_concurrency must be at least 1".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} outside [0, 2]",
                self.temperature
            )));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Request settings for the provider.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
        }
    }
}

/// Serde adapter for durations written as "60s" / "2m" or plain seconds.
pub mod human_duration {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => humantime::parse_duration(text.trim()).map_err(de::Error::custom),
        }
    }
}
