//! Structural validation of incoming labels.

use serde_json::Value;

/// Checks a raw document before ingestion.
pub trait DocumentValidator: Send + Sync {
    /// `Err` carries a human-readable reason.
    fn validate(&self, document: &Value) -> Result<(), String>;
}
