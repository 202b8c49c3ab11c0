//! JSON Schema validation for labels.
//!
//! Schema files may be YAML or JSON. A schema that describes an array of
//! labels is applied through its top-level `items`, compiled once.

use jsonschema::Validator;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::info;

use crate::error::{IngestError, Result};
use crate::traits::validator::DocumentValidator;

/// Validates labels against a compiled schema.
pub struct SchemaValidator {
    compiled: Validator,
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator").finish_non_exhaustive()
    }
}

impl SchemaValidator {
    /// Compile a schema document.
    pub fn from_value(schema: &Value) -> Result<Self> {
        let root = schema.get("items").unwrap_or(schema);
        let compiled = jsonschema::validator_for(root)
            .map_err(|e| IngestError::Schema(format!("invalid schema: {}", e)))?;
        Ok(Self { compiled })
    }

    /// Load and compile a YAML or JSON schema file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| IngestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let schema: Value = serde_yaml::from_str(&text)
            .map_err(|e| IngestError::Schema(format!("{}: {}", path.display(), e)))?;

        let validator = Self::from_value(&schema)?;
        info!(path = %path.display(), "Loaded label schema");
        Ok(validator)
    }
}

impl DocumentValidator for SchemaValidator {
    /// Reports the first violation, prefixed with the dotted path to the
    /// offending value.
    fn validate(&self, document: &Value) -> std::result::Result<(), String> {
        match self.compiled.iter_errors(document).next() {
            None => Ok(()),
            Some(error) => {
                let path = error
                    .instance_path
                    .as_str()
                    .trim_start_matches('/')
                    .replace('/', ".");
                if path.is_empty() {
                    Err(error.to_string())
                } else {
                    Err(format!("{}: {}", path, error))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> SchemaValidator {
        SchemaValidator::from_value(&json!({
            "type": "array",
            "items": {
                "type": "object",
                "required": ["slug", "drugName"],
                "properties": {
                    "slug": { "type": "string", "minLength": 1, "pattern": "^[a-z0-9-]+$" },
                    "drugName": { "type": "string" },
                    "label": {
                        "type": "object",
                        "properties": {
                            "genericName": { "type": ["string", "null"] },
                            "boxedWarnings": { "type": "array", "items": { "type": "string" } }
                        }
                    },
                    "status": { "enum": ["active", "discontinued"] },
                    "rxcui": { "type": "integer" }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_document() {
        let document = json!({
            "slug": "ozempic-adec4fd",
            "drugName": "Ozempic",
            "label": { "genericName": null, "boxedWarnings": ["thyroid C-cell tumors"] },
            "status": "active",
            "rxcui": 1991302,
            "extra": { "anything": true }
        });
        assert_eq!(schema().validate(&document), Ok(()));
    }

    #[test]
    fn test_missing_required_field() {
        let err = schema().validate(&json!({ "drugName": "Ozempic" })).unwrap_err();
        assert!(err.contains("slug"));
        assert!(err.contains("is a required property"));
    }

    #[test]
    fn test_nested_type_error_has_path() {
        let err = schema()
            .validate(&json!({
                "slug": "x",
                "drugName": "X",
                "label": { "boxedWarnings": ["ok", 3] }
            }))
            .unwrap_err();
        assert!(err.starts_with("label.boxedWarnings.1: 3 is not of type"));
    }

    #[test]
    fn test_enum_and_integer() {
        let base = json!({ "slug": "x", "drugName": "X" });
        let mut bad_status = base.clone();
        bad_status["status"] = json!("recalled");
        assert!(schema().validate(&bad_status).unwrap_err().starts_with("status:"));

        let mut bad_rxcui = base;
        bad_rxcui["rxcui"] = json!(1.5);
        assert!(schema().validate(&bad_rxcui).is_err());
    }

    #[test]
    fn test_string_constraints_and_closed_objects() {
        let validator = SchemaValidator::from_value(&json!({
            "type": "array",
            "items": {
                "type": "object",
                "required": ["slug"],
                "additionalProperties": false,
                "properties": {
                    "slug": { "type": "string", "minLength": 1, "pattern": "^[a-z-]+$" }
                }
            }
        }))
        .unwrap();

        assert!(validator.validate(&json!({ "slug": "ok" })).is_ok());
        assert!(validator.validate(&json!({ "slug": "" })).unwrap_err().starts_with("slug:"));
        assert!(validator
            .validate(&json!({ "slug": "BAD SLUG!" }))
            .unwrap_err()
            .starts_with("slug:"));
        assert!(validator.validate(&json!({ "slug": "ok", "extra": 1 })).is_err());
    }

    #[test]
    fn test_combinators_and_local_refs() {
        let validator = SchemaValidator::from_value(&json!({
            "type": "object",
            "$defs": { "section": { "type": "string", "maxLength": 10 } },
            "properties": {
                "dosage": { "$ref": "#/$defs/section" },
                "route": { "anyOf": [{ "const": "oral" }, { "const": "subcutaneous" }] },
                "warnings": { "type": "array", "minItems": 1 }
            }
        }))
        .unwrap();

        assert!(validator.validate(&json!({ "dosage": "50 mg", "route": "oral" })).is_ok());
        assert!(validator.validate(&json!({ "dosage": "fifty milligrams daily" })).is_err());
        assert!(validator.validate(&json!({ "route": "topical" })).is_err());
        assert!(validator.validate(&json!({ "warnings": [] })).is_err());
    }

    #[test]
    fn test_non_object_document() {
        let err = schema().validate(&json!("Ozempic")).unwrap_err();
        assert!(err.starts_with("\"Ozempic\" is not of type"));
    }

    #[test]
    fn test_yaml_schema_file() {
        let path = std::env::temp_dir().join(format!("label-schema-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "type: object\nrequired: [slug]\nproperties:\n  slug:\n    type: string\n    minLength: 3\n",
        )
        .unwrap();

        let validator = SchemaValidator::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(validator.validate(&json!({ "slug": "abc" })).is_ok());
        assert!(validator.validate(&json!({ "slug": "ab" })).is_err());
        assert!(validator.validate(&json!({ "slug": 1 })).is_err());
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let err = SchemaValidator::from_value(&json!({ "type": "date" })).unwrap_err();
        assert!(matches!(err, IngestError::Schema(_)));
    }
}
