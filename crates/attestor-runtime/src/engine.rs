//! Review engine: evaluates every rule of a rule set against one document.
//!
//! Deterministic rules run locally. Generative rules go through the
//! [`GenerativeClient`]; an unavailable service or an unreadable response
//! is resolved by the configured [`FallbackStrategy`]. Results keep
//! rule-set order regardless of `max_concurrency`.
//!
//! Circuit-breaker state and usage counters are scoped to one
//! [`ReviewEngine::evaluate`] call; only the configuration is shared
//! between runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use attestor_core::{
    evaluate_deterministic, parse_judgment, EvaluationContext, EvaluationMethod, KeywordFallback,
    ReviewReport, RuleOutcome, RuleSpec, Verdict,
};

use crate::client::{GenerativeClient, Invocation};
use crate::config::RuntimeConfig;
use crate::providers::{LlmProvider, ProviderRegistry};
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, FallbackStrategy, RunUsage, UsageTracker};
use crate::RuntimeError;

/// Report plus usage for one review run.
#[derive(Debug)]
pub struct RuntimeResult {
    pub report: ReviewReport,

    /// Generative usage of this run
    pub usage: RunUsage,
}

/// Evaluates rule sets with generative assistance.
pub struct ReviewEngine {
    client: GenerativeClient,
    circuit_breaker: CircuitBreakerConfig,
    fallback: FallbackStrategy,
    scorer: KeywordFallback,
    max_concurrency: usize,
}

impl ReviewEngine {
    pub fn new(provider: Arc<dyn LlmProvider>, config: RuntimeConfig) -> Self {
        let client = GenerativeClient::new(provider, config.completion_config(), config.excerpt_chars);

        Self {
            client,
            circuit_breaker: config.circuit_breaker,
            fallback: config.fallback,
            scorer: KeywordFallback::new(),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// Build an engine whose provider comes from `registry`.
    pub fn from_config(config: RuntimeConfig, registry: &ProviderRegistry) -> Result<Self, RuntimeError> {
        config.validate()?;
        let provider = registry.create(&config.provider, &config.provider_options)?;
        Ok(Self::new(provider, config))
    }

    /// Evaluate every rule in `ctx`.
    ///
    /// Never fails: each rule ends in exactly one outcome.
    pub async fn evaluate(&self, ctx: &EvaluationContext) -> RuntimeResult {
        let usage = UsageTracker::new();
        let circuit_breaker = CircuitBreaker::new(self.circuit_breaker.clone());
        let text = ctx.document_text();
        let inputs = ctx.user_inputs();

        tracing::info!(
            rule_set = ctx.rule_set().name.as_deref().unwrap_or("unnamed"),
            rules = ctx.rules().len(),
            provider = self.client.provider_name(),
            max_concurrency = self.max_concurrency,
            "Starting review"
        );

        let results: Vec<RuleOutcome> = stream::iter(ctx.rules())
            .map(|rule| self.evaluate_rule(rule, text, inputs, &usage, &circuit_breaker))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let report = ReviewReport::from_outcomes(results);
        let usage = usage.snapshot();
        tracing::info!(
            total = report.summary.total,
            passed = report.summary.passed_count,
            partial = report.summary.partial_count,
            critical_failures = report.summary.critical_failures,
            score = report.summary.compliance_score,
            overall = %report.summary.overall_status,
            generative_calls = usage.generative_calls,
            fallbacks = usage.fallbacks,
            "Review complete"
        );

        RuntimeResult { report, usage }
    }

    async fn evaluate_rule(
        &self,
        rule: &RuleSpec,
        text: &str,
        inputs: &BTreeMap<String, String>,
        usage: &UsageTracker,
        circuit_breaker: &CircuitBreaker,
    ) -> RuleOutcome {
        if !rule.is_generative() {
            let verdict = evaluate_deterministic(rule, text, inputs);
            tracing::debug!(rule_id = %rule.id, status = %verdict.status, "Deterministic rule evaluated");
            return RuleOutcome::new(rule, verdict, EvaluationMethod::Deterministic);
        }

        if let Err(reason) = rule.required_input(inputs) {
            tracing::debug!(rule_id = %rule.id, "Skipping generative call, input missing");
            return RuleOutcome::new(rule, Verdict::failed(rule, reason), EvaluationMethod::Generative);
        }

        let (verdict, method) = match self.client.invoke(rule, text, inputs, circuit_breaker).await {
            Invocation::Response { text: raw, usage: tokens } => {
                usage.record_response(&tokens);
                match parse_judgment(&raw) {
                    Ok(judgment) => (judgment.into_verdict(rule), EvaluationMethod::Generative),
                    Err(e) => {
                        usage.record_parse_failure();
                        tracing::warn!(rule_id = %rule.id, error = %e, "Unreadable generative response");
                        let cause = format!("Could not read generative response ({})", e);
                        self.fallback.resolve(rule, text, &self.scorer, &cause)
                    }
                }
            }
            Invocation::Unavailable { reason } => {
                usage.record_unavailable();
                let cause = format!("Generative service unavailable: {}", reason);
                self.fallback.resolve(rule, text, &self.scorer, &cause)
            }
        };

        if method == EvaluationMethod::Fallback {
            usage.record_fallback();
        }
        tracing::debug!(rule_id = %rule.id, status = %verdict.status, method = ?method, "Generative rule evaluated");
        RuleOutcome::new(rule, verdict, method)
    }

    /// Whether the generative service is reachable.
    pub async fn health_check(&self) -> bool {
        self.client.health_check().await
    }
}

/// Builder for [`ReviewEngine`].
pub struct ReviewEngineBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    config: RuntimeConfig,
}

impl ReviewEngineBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            config: RuntimeConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine.
    pub fn build(self) -> Result<ReviewEngine, RuntimeError> {
        let provider = self
            .provider
            .ok_or_else(|| RuntimeError::ProviderNotConfigured("No provider set".to_string()))?;
        self.config.validate()?;
        Ok(ReviewEngine::new(provider, self.config))
    }
}

impl Default for ReviewEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
