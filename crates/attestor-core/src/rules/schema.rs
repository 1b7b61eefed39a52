//! JSON Schema validation for rule sets.
//!
//! Rule-set documents (JSON or YAML) are checked against the embedded
//! `schema/ruleset.schema.json` before they are deserialized, so structural
//! mistakes surface with a path into the document rather than a serde
//! error halfway through.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded rule-set schema (loaded at compile time).
const RULE_SET_SCHEMA_JSON: &str = include_str!("../../schema/ruleset.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema loading.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(RULE_SET_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(SchemaError::LoadError(e.clone())),
    }
}

/// Validate a rule-set document against the schema.
///
/// Returns every violation as `"<message> at <json pointer>"`.
pub fn validate_rule_set_schema(document: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
