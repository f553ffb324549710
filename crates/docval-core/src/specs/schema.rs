//! JSON Schema validation for spec files.
//!
//! Spec files are validated against schema/validation-specs.schema.json
//! before they are deserialized, so a malformed entry is reported with its
//! location instead of as a generic serde error.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded spec schema (loaded at compile time).
const SPECS_SCHEMA_JSON: &str = include_str!("../../../../schema/validation-specs.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(SPECS_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile schema: {}", e)),
        }
    });

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(SchemaError::LoadError(e.clone())),
    }
}

/// Validate a spec list against the schema.
///
/// Returns every violation as `"<message> at <instance path>"`.
pub fn validate_specs_schema(specs_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(specs_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_compiles() {
        assert!(get_validator().is_ok());
    }

    #[test]
    fn test_valid_specs() {
        let specs = json!([
            {"name": "Has Title", "description": "Document must have a title", "category": "metadata"},
            {"name": "Has Summary", "description": "Document must open with a summary"}
        ]);
        assert!(validate_specs_schema(&specs).is_ok());
    }

    #[test]
    fn test_missing_description_reported_with_path() {
        let specs = json!([
            {"name": "Has Title", "description": "ok"},
            {"name": "Broken"}
        ]);
        let errors = validate_specs_schema(&specs).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("description"));
        assert!(errors[0].contains("/1"));
    }

    #[test]
    fn test_not_an_array() {
        let specs = json!({"name": "Has Title", "description": "ok"});
        assert!(validate_specs_schema(&specs).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let specs = json!([{"name": "A", "description": "B", "severity": "high"}]);
        assert!(validate_specs_schema(&specs).is_err());
    }
}
