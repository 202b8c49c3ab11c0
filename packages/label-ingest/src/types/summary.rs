//! Per-document and per-batch ingestion results.

use serde::Serialize;

/// What the importer did with a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportAction {
    Inserted,
    Updated,
    /// Content hash matched the stored document
    Skipped,
}

/// How classification contributed to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Enrichment {
    /// No classifier, or classification disabled
    None,
    /// A real classification was merged
    Enhanced,
    /// Classification degraded; the default result was merged
    Degraded,
    /// Classification degraded; the stored enrichment was carried forward
    Reused,
}

impl Enrichment {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Degraded | Self::Reused)
    }
}

/// Result of ingesting one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentReport {
    pub action: ImportAction,
    pub enrichment: Enrichment,
}

/// Counters for an import batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,

    /// One `Document {n}: {reason}` line per failure, 1-based
    pub errors: Vec<String>,

    pub ai_enhanced: usize,
    pub ai_failed: usize,
}

impl ImportSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a processed document.
    pub fn record(&mut self, report: DocumentReport) {
        match report.action {
            ImportAction::Inserted => self.inserted += 1,
            ImportAction::Updated => self.updated += 1,
            ImportAction::Skipped => self.skipped += 1,
        }
        match report.enrichment {
            Enrichment::Enhanced => self.ai_enhanced += 1,
            e if e.is_failure() => self.ai_failed += 1,
            _ => {}
        }
    }

    /// Count a failed document. `index` is zero-based.
    pub fn record_failure(&mut self, index: usize, reason: impl std::fmt::Display) {
        self.failed += 1;
        self.errors.push(format!("Document {}: {}", index + 1, reason));
    }

    /// Documents seen, failed ones included.
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.skipped + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Outcome of validating a batch without writing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DryRunReport {
    pub valid: usize,
    pub invalid: usize,
    pub errors: Vec<String>,
}

impl DryRunReport {
    pub fn is_success(&self) -> bool {
        self.invalid == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_enrichment() {
        let mut summary = ImportSummary::new();
        summary.record(DocumentReport {
            action: ImportAction::Inserted,
            enrichment: Enrichment::Enhanced,
        });
        summary.record(DocumentReport {
            action: ImportAction::Skipped,
            enrichment: Enrichment::Reused,
        });
        summary.record(DocumentReport {
            action: ImportAction::Updated,
            enrichment: Enrichment::None,
        });
        summary.record_failure(3, "missing required 'slug' field");

        assert_eq!((summary.inserted, summary.updated, summary.skipped), (1, 1, 1));
        assert_eq!((summary.ai_enhanced, summary.ai_failed), (1, 1));
        assert_eq!(summary.errors, vec!["Document 4: missing required 'slug' field"]);
        assert_eq!(summary.total(), 4);
        assert!(!summary.is_success());
    }
}
