//! Circuit breaker keyed by provider name.
//!
//! After `failure_threshold` consecutive unavailable outcomes the circuit
//! opens and the client reports the service unavailable without calling
//! it. Once `recovery_timeout` has elapsed one probe call is let through
//! (half-open); `success_threshold` successes close the circuit again.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::human_duration;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,

    /// Time before a probe call is allowed ("30s", "2m")
    #[serde(with = "human_duration")]
    pub recovery_timeout: Duration,

    /// Probe successes needed to close
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 1,
        }
    }
}

/// State of one provider's circuit.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Calls are short-circuited
    Open { opened_at: Instant },

    /// Probing whether the service is back
    HalfOpen { successes: u32 },
}

/// Per-provider circuit breaker.
pub struct CircuitBreaker {
    states: RwLock<HashMap<String, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Whether calls to `provider` should be skipped.
    ///
    /// An open circuit whose recovery timeout has elapsed moves to
    /// half-open and lets the call through.
    pub fn is_open(&self, provider: &str) -> bool {
        let mut states = self.states.write();
        let opened_at = match states.get(provider) {
            Some(CircuitState::Open { opened_at }) => *opened_at,
            _ => return false,
        };

        if opened_at.elapsed() < self.config.recovery_timeout {
            return true;
        }

        states.insert(provider.to_string(), CircuitState::HalfOpen { successes: 0 });
        tracing::info!(provider, "Circuit half-open, probing generative service");
        false
    }

    /// Record a call that produced a response.
    pub fn record_success(&self, provider: &str) {
        let mut states = self.states.write();
        let next = match states.get(provider) {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    tracing::info!(provider, "Circuit closed after successful probe");
                    CircuitState::Closed { failures: 0 }
                } else {
                    CircuitState::HalfOpen {
                        successes: successes + 1,
                    }
                }
            }
            Some(CircuitState::Open { opened_at }) => CircuitState::Open {
                opened_at: *opened_at,
            },
            _ => CircuitState::Closed { failures: 0 },
        };
        states.insert(provider.to_string(), next);
    }

    /// Record a call that ended unavailable (error, non-success, timeout).
    pub fn record_failure(&self, provider: &str) {
        let mut states = self.states.write();
        let next = match states.get(provider) {
            None => self.after_failure(provider, 0),
            Some(CircuitState::Closed { failures }) => self.after_failure(provider, *failures),
            Some(CircuitState::HalfOpen { .. }) => {
                tracing::warn!(provider, "Circuit reopened after failed probe");
                CircuitState::Open {
                    opened_at: Instant::now(),
                }
            }
            Some(CircuitState::Open { opened_at }) => CircuitState::Open {
                opened_at: *opened_at,
            },
        };
        states.insert(provider.to_string(), next);
    }

    fn after_failure(&self, provider: &str, failures: u32) -> CircuitState {
        let failures = failures + 1;
        if failures >= self.config.failure_threshold {
            tracing::warn!(provider, failures, "Circuit opened after repeated failures");
            CircuitState::Open {
                opened_at: Instant::now(),
            }
        } else {
            CircuitState::Closed { failures }
        }
    }

    /// Current state of a provider's circuit.
    pub fn state(&self, provider: &str) -> CircuitState {
        self.states
            .read()
            .get(provider)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    /// Close every circuit.
    pub fn reset(&self) {
        self.states.write().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
