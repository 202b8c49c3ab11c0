//! Sanitizes model output into fixed-shape records.
//!
//! The completion API is an unreliable upstream: fields may be missing,
//! null, of the wrong type or padded with whitespace. Both validators are
//! total. They never fail and always return a fully populated value, logging
//! a warning for each field they had to default.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::types::classification::{ClassificationMetadata, ClassificationResult, ConfidenceLevel};

/// Coerce a raw model response into a [`ClassificationResult`].
pub fn validate_classification(raw: &Value) -> ClassificationResult {
    let mut result = ClassificationResult::default();

    let Some(object) = raw.as_object().filter(|o| !o.is_empty()) else {
        warn!("Invalid classification response: not an object");
        return result;
    };

    for field in ClassificationResult::TEXT_FIELDS {
        match object.get(field) {
            Some(Value::Null) => {}
            Some(value) => {
                let text = coerce_string(value);
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    if let Some(slot) = result.text_field_mut(field) {
                        *slot = trimmed.to_string();
                    }
                }
            }
            None => warn!(field, "Missing field in classification response, using default"),
        }
    }

    match object.get("confidence_level") {
        Some(value) => match value.as_str().and_then(ConfidenceLevel::from_literal) {
            Some(level) => result.confidence_level = level,
            None => warn!(%value, "Invalid confidence level, using default"),
        },
        None => warn!(
            field = "confidence_level",
            "Missing field in classification response, using default"
        ),
    }

    match object.get("source_sections_used") {
        Some(Value::Array(items)) => {
            result.source_sections_used = items
                .iter()
                .filter(|item| is_truthy(item))
                .map(coerce_string)
                .collect();
        }
        Some(value) => warn!(%value, "Invalid source sections, using default"),
        None => warn!(
            field = "source_sections_used",
            "Missing field in classification response, using default"
        ),
    }

    result
}

/// Coerce raw processing metadata into [`ClassificationMetadata`].
///
/// Counters and `processing_time` are truncated to non-negative whole
/// numbers.
pub fn validate_metadata(raw: &Value) -> ClassificationMetadata {
    let mut metadata = ClassificationMetadata::default();

    let Some(object) = raw.as_object().filter(|o| !o.is_empty()) else {
        warn!("Invalid metadata format: not an object");
        return metadata;
    };

    if let Some(model) = present(object, "model") {
        metadata.model = coerce_string(model);
    }
    if let Some(value) = present(object, "tokens_used") {
        metadata.tokens_used = coerce_count(value).unwrap_or_else(|| {
            warn!(%value, "Invalid tokens_used, using default");
            metadata.tokens_used
        });
    }
    if let Some(value) = present(object, "attempts") {
        metadata.attempts = coerce_count(value)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or_else(|| {
                warn!(%value, "Invalid attempts, using default");
                metadata.attempts
            });
    }
    if let Some(value) = present(object, "processing_time") {
        metadata.processing_time = coerce_seconds(value).unwrap_or_else(|| {
            warn!(%value, "Invalid processing_time, using default");
            metadata.processing_time
        });
    }
    if let Some(value) = object.get("cached") {
        metadata.cached = is_truthy(value);
    }
    if let Some(value) = object.get("rate_limited") {
        metadata.rate_limited = is_truthy(value);
    }
    if let Some(value) = present(object, "error") {
        metadata.error = Some(coerce_string(value));
    }

    metadata
}

fn present<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    match object.get(field) {
        Some(Value::Null) => None,
        Some(value) => Some(value),
        None => {
            debug!(field, "Missing field in metadata, using default");
            None
        }
    }
}

/// Strings pass through unquoted; everything else uses its JSON text.
fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn coerce_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.trunc() as u64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(u64::from(*b)),
        _ => None,
    }
}

fn coerce_seconds(value: &Value) -> Option<f64> {
    let seconds: f64 = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (seconds.is_finite() && seconds >= 0.0).then(|| seconds.trunc())
}
