//! Object-safe classification entry point for consumers.

use async_trait::async_trait;

use crate::document::DrugDocument;
use crate::types::classification::ClassificationOutcome;

/// Produces a classification for a drug document.
///
/// Never fails: implementations degrade to an unclassified outcome carrying
/// the error in its metadata.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, document: &DrugDocument) -> ClassificationOutcome;

    /// Whether calls can produce a real classification.
    fn is_enabled(&self) -> bool;
}
