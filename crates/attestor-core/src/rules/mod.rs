//! Rule-set loading and validation.
//!
//! Rule sets are structured data validated against JSON Schema, then
//! converted into typed [`RuleSpec`]s. Every structural problem is reported
//! at load time; evaluation never sees a malformed rule.

mod parser;
mod schema;

pub use parser::{Check, CheckType, RuleSet, RuleSetError, RuleSpec, INPUT_PLACEHOLDER};
pub use schema::validate_rule_set_schema;
