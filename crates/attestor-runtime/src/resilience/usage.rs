//! Usage accounting for one review run.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::providers::TokenUsage;

/// Accumulated generative usage for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunUsage {
    /// Calls that returned a response
    pub generative_calls: u32,

    /// Calls that ended unavailable, including short-circuited ones
    pub unavailable: u32,

    /// Responses the normalizer could not read
    pub parse_failures: u32,

    /// Rules resolved by the keyword fallback
    pub fallbacks: u32,

    /// Prompt/input tokens
    pub prompt_tokens: u32,

    /// Completion/output tokens
    pub completion_tokens: u32,

    /// Total tokens used
    pub total_tokens: u32,
}

/// Thread-safe [`RunUsage`] accumulator shared by concurrent rule tasks.
#[derive(Debug, Default)]
pub struct UsageTracker {
    usage: Mutex<RunUsage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed call.
    pub fn record_response(&self, tokens: &TokenUsage) {
        let mut usage = self.usage.lock();
        usage.generative_calls = usage.generative_calls.saturating_add(1);
        usage.prompt_tokens = usage.prompt_tokens.saturating_add(tokens.prompt_tokens);
        usage.completion_tokens = usage.completion_tokens.saturating_add(tokens.completion_tokens);
        usage.total_tokens = usage.total_tokens.saturating_add(tokens.total());
    }

    pub fn record_unavailable(&self) {
        let mut usage = self.usage.lock();
        usage.unavailable = usage.unavailable.saturating_add(1);
    }

    pub fn record_parse_failure(&self) {
        let mut usage = self.usage.lock();
        usage.parse_failures = usage.parse_failures.saturating_add(1);
    }

    pub fn record_fallback(&self) {
        let mut usage = self.usage.lock();
        usage.fallbacks = usage.fallbacks.saturating_add(1);
    }

    /// Snapshot of the counters.
    pub fn snapshot(&self) -> RunUsage {
        self.usage.lock().clone()
    }
}
