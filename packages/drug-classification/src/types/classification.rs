//! Classification result and processing metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Placeholder for any classification field the model did not supply.
pub const NOT_SPECIFIED: &str = "Not specified";

/// How sure the model is about its classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    High,
    Medium,
    #[default]
    Low,
}

impl ConfidenceLevel {
    /// Parse the exact literal ("High", "Medium", "Low").
    pub fn from_literal(value: &str) -> Option<Self> {
        match value {
            "High" => Some(Self::High),
            "Medium" => Some(Self::Medium),
            "Low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Therapeutic classification of a drug label.
///
/// Always fully populated: every string field falls back to
/// [`NOT_SPECIFIED`], the confidence to `Low`, and the sections to empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub primary_therapeutic_class: String,
    pub pharmacological_class: String,
    pub chemical_class: String,
    pub atc_code: String,
    pub controlled_substance_schedule: String,
    pub therapeutic_indication: String,
    pub mechanism_of_action_summary: String,
    pub confidence_level: ConfidenceLevel,
    pub source_sections_used: Vec<String>,
}

impl Default for ClassificationResult {
    fn default() -> Self {
        Self {
            primary_therapeutic_class: NOT_SPECIFIED.to_string(),
            pharmacological_class: NOT_SPECIFIED.to_string(),
            chemical_class: NOT_SPECIFIED.to_string(),
            atc_code: NOT_SPECIFIED.to_string(),
            controlled_substance_schedule: NOT_SPECIFIED.to_string(),
            therapeutic_indication: NOT_SPECIFIED.to_string(),
            mechanism_of_action_summary: NOT_SPECIFIED.to_string(),
            confidence_level: ConfidenceLevel::Low,
            source_sections_used: Vec::new(),
        }
    }
}

impl ClassificationResult {
    /// The string-valued fields, by name.
    pub const TEXT_FIELDS: [&'static str; 7] = [
        "primary_therapeutic_class",
        "pharmacological_class",
        "chemical_class",
        "atc_code",
        "controlled_substance_schedule",
        "therapeutic_indication",
        "mechanism_of_action_summary",
    ];

    /// Mutable access to a string field by name.
    pub(crate) fn text_field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            "primary_therapeutic_class" => Some(&mut self.primary_therapeutic_class),
            "pharmacological_class" => Some(&mut self.pharmacological_class),
            "chemical_class" => Some(&mut self.chemical_class),
            "atc_code" => Some(&mut self.atc_code),
            "controlled_substance_schedule" => Some(&mut self.controlled_substance_schedule),
            "therapeutic_indication" => Some(&mut self.therapeutic_indication),
            "mechanism_of_action_summary" => Some(&mut self.mechanism_of_action_summary),
            _ => None,
        }
    }

    /// JSON object as persisted on the drug document and in the cache.
    pub fn to_value(&self) -> Value {
        json!({
            "primary_therapeutic_class": self.primary_therapeutic_class,
            "pharmacological_class": self.pharmacological_class,
            "chemical_class": self.chemical_class,
            "atc_code": self.atc_code,
            "controlled_substance_schedule": self.controlled_substance_schedule,
            "therapeutic_indication": self.therapeutic_indication,
            "mechanism_of_action_summary": self.mechanism_of_action_summary,
            "confidence_level": self.confidence_level.as_str(),
            "source_sections_used": self.source_sections_used,
        })
    }
}

/// How a classification was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetadata {
    /// Model name, or "none" when no model was called
    pub model: String,
    pub tokens_used: u64,
    /// Seconds of wall-clock time, including retries and backoff
    pub processing_time: f64,
    pub attempts: u32,
    pub cached: bool,
    #[serde(default)]
    pub rate_limited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for ClassificationMetadata {
    fn default() -> Self {
        Self {
            model: "unknown".to_string(),
            tokens_used: 0,
            processing_time: 0.0,
            attempts: 0,
            cached: false,
            rate_limited: false,
            error: None,
        }
    }
}

impl ClassificationMetadata {
    /// Metadata for a fresh call against `model`.
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// JSON object as persisted in the cache.
    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "model": self.model,
            "tokens_used": self.tokens_used,
            "processing_time": self.processing_time,
            "attempts": self.attempts,
            "cached": self.cached,
            "rate_limited": self.rate_limited,
        });
        if let Some(error) = &self.error {
            value["error"] = Value::String(error.clone());
        }
        value
    }
}

/// A classification read back from the cache.
#[derive(Debug, Clone)]
pub struct CachedClassification {
    pub classification: ClassificationResult,
    /// Stored metadata with `cached` forced to true
    pub metadata: ClassificationMetadata,
    pub cached_at: DateTime<Utc>,
    pub cache_age_seconds: f64,
    /// Seconds spent reading the entry
    pub retrieval_time: f64,
}

/// What the classifier hands back for one document.
#[derive(Debug, Clone)]
pub struct ClassificationOutcome {
    pub classification: ClassificationResult,
    pub metadata: ClassificationMetadata,
    pub cached: bool,
    pub cached_at: Option<DateTime<Utc>>,
    pub cache_age_seconds: Option<f64>,
}

impl ClassificationOutcome {
    /// The fully defaulted result used when classification is disabled or failed.
    pub fn unclassified() -> Self {
        Self {
            classification: ClassificationResult::default(),
            metadata: ClassificationMetadata::for_model("none"),
            cached: false,
            cached_at: None,
            cache_age_seconds: None,
        }
    }

    /// Degraded result annotated with the failure.
    pub fn failed(error: impl Into<String>, attempts: u32, processing_time: f64) -> Self {
        let mut outcome = Self::unclassified();
        outcome.metadata.error = Some(error.into());
        outcome.metadata.attempts = attempts;
        outcome.metadata.processing_time = processing_time;
        outcome
    }

    /// Fresh result from the model.
    pub fn computed(classification: ClassificationResult, metadata: ClassificationMetadata) -> Self {
        Self {
            classification,
            metadata,
            cached: false,
            cached_at: None,
            cache_age_seconds: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.metadata.error.is_some()
    }
}

impl From<CachedClassification> for ClassificationOutcome {
    fn from(hit: CachedClassification) -> Self {
        Self {
            classification: hit.classification,
            metadata: hit.metadata,
            cached: true,
            cached_at: Some(hit.cached_at),
            cache_age_seconds: Some(hit.cache_age_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_fully_populated() {
        let result = ClassificationResult::default();
        let value = result.to_value();
        for field in ClassificationResult::TEXT_FIELDS {
            assert_eq!(value[field], NOT_SPECIFIED);
        }
        assert_eq!(value["confidence_level"], "Low");
        assert_eq!(value["source_sections_used"], serde_json::json!([]));
    }

    #[test]
    fn test_confidence_literals() {
        assert_eq!(ConfidenceLevel::from_literal("High"), Some(ConfidenceLevel::High));
        assert_eq!(ConfidenceLevel::from_literal("high"), None);
        assert_eq!(ConfidenceLevel::Medium.to_string(), "Medium");
    }

    #[test]
    fn test_failed_outcome() {
        let outcome = ClassificationOutcome::failed("boom", 3, 7.5);
        assert!(outcome.is_degraded());
        assert_eq!(outcome.metadata.model, "none");
        assert_eq!(outcome.metadata.attempts, 3);
        assert_eq!(outcome.classification.confidence_level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_metadata_value_omits_absent_error() {
        let value = ClassificationMetadata::for_model("gpt-4o-mini").to_value();
        assert!(value.get("error").is_none());
        assert_eq!(value["model"], "gpt-4o-mini");
    }
}
