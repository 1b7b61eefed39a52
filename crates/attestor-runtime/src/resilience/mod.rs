//! Resilience for generative calls.
//!
//! - Circuit breaker: fail fast to the fallback path after repeated
//!   unavailability, without retrying
//! - Fallback strategy: what a generative rule resolves to when the
//!   service cannot answer
//! - Usage tracking per run

mod circuit_breaker;
mod fallback;
mod usage;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use fallback::FallbackStrategy;
pub use usage::{RunUsage, UsageTracker};
