//! # attestor-runtime
//!
//! Generative evaluation for attestor rule sets.
//!
//! `attestor-core` evaluates deterministic rules and reconciles verdicts
//! without any network access. This crate adds the generative path: a
//! provider abstraction (Ollama behind the `ollama` feature), prompt
//! construction, a timeout- and circuit-breaker-guarded client, and the
//! [`ReviewEngine`] that runs a whole rule set.
//!
//! ## Example
//!
//! ```rust,ignore
//! use attestor_runtime::{ProviderRegistry, ReviewEngine, RuntimeConfig};
//!
//! let config = RuntimeConfig::load(None)?;
//! let engine = ReviewEngine::from_config(config, &ProviderRegistry::with_defaults())?;
//! let result = engine.evaluate(&ctx).await;
//! println!("{}", result.report.summary.overall_status);
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod prompts;
pub mod providers;
pub mod resilience;

pub use client::{excerpt, GenerativeClient, Invocation, DEFAULT_EXCERPT_CHARS};
pub use config::{ConfigError, RuntimeConfig};
pub use engine::{ReviewEngine, ReviewEngineBuilder, RuntimeResult};
pub use providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    ProviderFactory, ProviderRegistry, TokenUsage,
};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, FallbackStrategy, RunUsage};

#[cfg(feature = "ollama")]
pub use providers::{OllamaProvider, OllamaProviderFactory};

use thiserror::Error;

/// Errors from building the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
