//! Content fingerprints for change detection and cache addressing.
//!
//! Both digests run over a canonical serialization: object keys sorted,
//! scalars written in their JSON form, no insignificant whitespace. Field
//! insertion order therefore never changes a fingerprint.
//!
//! - [`document_hash`] is SHA-256 over the whole document minus storage and
//!   per-run fields. It decides insert/update/skip.
//! - [`cache_key`] is an MD5 over the classification input, prefixed with the
//!   drug's identity so keys stay readable in logs. A collision only costs a
//!   cache miss.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::document::{
    DrugDocument, CLASSIFICATION_SECTIONS, PROCESSING_METADATA_FIELD, SYSTEM_FIELDS,
};

/// Namespace prefix of every cache key.
pub const CACHE_KEY_PREFIX: &str = "drug-classification";

/// Write `value` in canonical form.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// SHA-256 fingerprint of a document's semantic content.
///
/// Ignores `_id`, `_hash`, `_created_at`, `_updated_at` and the
/// classification processing metadata.
pub fn document_hash(document: &DrugDocument) -> String {
    let content: Map<String, Value> = document
        .as_map()
        .iter()
        .filter(|(key, _)| !is_volatile(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(canonical_json(&Value::Object(content)).as_bytes());
    format!("{:x}", hasher.finalize())
}

fn is_volatile(key: &str) -> bool {
    SYSTEM_FIELDS.contains(&key) || key == PROCESSING_METADATA_FIELD
}

/// MD5 over the label content that feeds classification.
pub fn classification_digest(document: &DrugDocument) -> String {
    let mut input = Map::new();
    if let Some(label) = document.label() {
        let fields = std::iter::once("genericName")
            .chain(CLASSIFICATION_SECTIONS.iter().map(|(field, _)| *field));
        for field in fields {
            if let Some(value) = label.get(field) {
                input.insert(field.to_string(), value.clone());
            }
        }
    }

    format!("{:x}", md5::compute(canonical_json(&Value::Object(input))))
}

/// Cache key: `drug-classification:{slug}:{setId}:{drugName}:{digest}`.
pub fn cache_key(document: &DrugDocument) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        CACHE_KEY_PREFIX,
        document.slug().unwrap_or_default(),
        document.set_id().unwrap_or_default(),
        document.drug_name().unwrap_or_default(),
        classification_digest(document)
    )
}
