//! Drug label document model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields written by the storage layer, never part of a label's content.
pub const SYSTEM_FIELDS: [&str; 4] = ["_id", "_hash", "_created_at", "_updated_at"];

/// Field holding the merged therapeutic classification.
pub const CLASSIFICATION_FIELD: &str = "therapeuticClass";

/// Field holding per-run classification provenance (model, timing, cache hit).
pub const PROCESSING_METADATA_FIELD: &str = "aiProcessingMetadata";

/// Label sections that feed classification, in prompt priority order.
pub const CLASSIFICATION_SECTIONS: [(&str, &str); 7] = [
    ("indicationsAndUsage", "Indications and Usage"),
    ("mechanismOfAction", "Mechanism of Action"),
    ("clinicalPharmacology", "Clinical Pharmacology"),
    ("description", "Description"),
    ("dosageAndAdministration", "Dosage and Administration"),
    ("warningsAndPrecautions", "Warnings and Precautions"),
    ("adverseReactions", "Adverse Reactions"),
];

/// A drug label record: an arbitrary JSON object keyed by a caller-assigned
/// `slug`, with `drugName`, `setId` and a `label` object of free-text sections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrugDocument(Map<String, Value>);

impl DrugDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON value. Returns the value back if it is not an object.
    pub fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Identity key.
    pub fn slug(&self) -> Option<&str> {
        self.str_field("slug")
    }

    pub fn drug_name(&self) -> Option<&str> {
        self.str_field("drugName")
    }

    pub fn set_id(&self) -> Option<&str> {
        self.str_field("setId")
    }

    /// The `label` sub-object, if present.
    pub fn label(&self) -> Option<&Map<String, Value>> {
        self.0.get("label").and_then(Value::as_object)
    }

    /// A string section of the label (e.g. `indicationsAndUsage`).
    pub fn label_section(&self, name: &str) -> Option<&str> {
        self.label()
            .and_then(|label| label.get(name))
            .and_then(Value::as_str)
    }

    pub fn generic_name(&self) -> Option<&str> {
        self.label_section("genericName")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Drop storage system fields, leaving only label content.
    pub fn without_system_fields(mut self) -> Self {
        for field in SYSTEM_FIELDS {
            self.0.remove(field);
        }
        self
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for DrugDocument {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accessors() {
        let doc = DrugDocument::from_value(json!({
            "slug": "mounjaro-d2d7da5",
            "drugName": "Mounjaro",
            "setId": "d2d7da5d",
            "label": { "genericName": "tirzepatide", "indicationsAndUsage": "<p>T2DM</p>" }
        }))
        .unwrap();

        assert_eq!(doc.slug(), Some("mounjaro-d2d7da5"));
        assert_eq!(doc.drug_name(), Some("Mounjaro"));
        assert_eq!(doc.set_id(), Some("d2d7da5d"));
        assert_eq!(doc.generic_name(), Some("tirzepatide"));
        assert_eq!(doc.label_section("indicationsAndUsage"), Some("<p>T2DM</p>"));
        assert_eq!(doc.label_section("missing"), None);
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert_eq!(DrugDocument::from_value(json!([1, 2])), Err(json!([1, 2])));
        assert!(DrugDocument::from_value(Value::Null).is_err());
    }

    #[test]
    fn test_non_string_slug_is_absent() {
        let doc = DrugDocument::new().with("slug", 42);
        assert_eq!(doc.slug(), None);
    }

    #[test]
    fn test_without_system_fields() {
        let doc = DrugDocument::new()
            .with("slug", "d1")
            .with("_hash", "abc")
            .with("_created_at", "2024-01-01T00:00:00Z")
            .without_system_fields();
        assert_eq!(doc.as_map().len(), 1);
    }
}
