//! Generative verdict client.
//!
//! One call per rule per document, no retries, no caching. Any error,
//! non-success status, timeout, or open circuit comes back as
//! [`Invocation::Unavailable`] so the engine can fall back. The circuit
//! breaker is supplied per call and lives for one review run.

use std::collections::BTreeMap;
use std::sync::Arc;

use attestor_core::RuleSpec;

use crate::prompts;
use crate::providers::{CompletionConfig, LlmProvider, TokenUsage};
use crate::resilience::CircuitBreaker;

/// Default excerpt budget, in characters.
pub const DEFAULT_EXCERPT_CHARS: usize = 10_000;

/// Outcome of one generative call.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// The service answered; `text` is unparsed.
    Response { text: String, usage: TokenUsage },

    /// The service could not answer.
    Unavailable { reason: String },
}

/// Leading `max_chars` characters of `text`, cut on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Sends rule judgments to a provider, guarded by a timeout.
pub struct GenerativeClient {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    excerpt_chars: usize,
}

impl GenerativeClient {
    pub fn new(provider: Arc<dyn LlmProvider>, completion: CompletionConfig, excerpt_chars: usize) -> Self {
        Self {
            provider,
            completion,
            excerpt_chars,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Ask the service to judge `rule` against `text`.
    pub async fn invoke(
        &self,
        rule: &RuleSpec,
        text: &str,
        inputs: &BTreeMap<String, String>,
        circuit_breaker: &CircuitBreaker,
    ) -> Invocation {
        let provider = self.provider.name();
        if circuit_breaker.is_open(provider) {
            tracing::debug!(rule_id = %rule.id, provider, "Circuit open, skipping generative call");
            return Invocation::Unavailable {
                reason: format!("circuit open for provider '{}'", provider),
            };
        }

        let expected = rule.required_input(inputs).ok().flatten();
        let messages = prompts::build_messages(rule, excerpt(text, self.excerpt_chars), expected);

        let timeout = self.completion.timeout;
        let started = std::time::Instant::now();
        let result = tokio::time::timeout(timeout, self.provider.complete(messages, &self.completion)).await;

        match result {
            Ok(Ok(response)) => {
                circuit_breaker.record_success(provider);
                tracing::debug!(
                    rule_id = %rule.id,
                    provider,
                    model = %response.model,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    tokens = response.usage.total(),
                    "Generative call completed"
                );
                Invocation::Response {
                    text: response.content,
                    usage: response.usage,
                }
            }
            Ok(Err(e)) => {
                circuit_breaker.record_failure(provider);
                tracing::warn!(rule_id = %rule.id, provider, error = %e, "Generative call failed");
                Invocation::Unavailable {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                circuit_breaker.record_failure(provider);
                tracing::warn!(rule_id = %rule.id, provider, timeout = ?timeout, "Generative call timed out");
                Invocation::Unavailable {
                    reason: format!("timed out after {}", humantime::format_duration(timeout)),
                }
            }
        }
    }

    /// Whether the service is reachable.
    pub async fn health_check(&self) -> bool {
        self.provider.health_check().await
    }
}
