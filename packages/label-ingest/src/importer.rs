//! Idempotent label import: validate, enrich, fingerprint, upsert.
//!
//! Each document is keyed by `slug` and fingerprinted with
//! [`document_hash`]. An incoming document whose fingerprint matches the
//! stored one is skipped, so re-running an import over unchanged input
//! writes nothing.

use chrono::Utc;
use drug_classification::{
    document_hash, ClassificationOutcome, Classifier, DrugDocument, CLASSIFICATION_FIELD,
    PROCESSING_METADATA_FIELD,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result, StoreError};
use crate::images::rewrite_document_images;
use crate::traits::{
    image_lookup::ImageIdLookup, store::DocumentStore, validator::DocumentValidator,
};
use crate::types::stored::StoredDocument;
use crate::types::summary::{DocumentReport, DryRunReport, Enrichment, ImportAction, ImportSummary};

/// Read a label file: a JSON array of labels, or a single label object.
pub fn read_documents(path: impl AsRef<Path>) -> Result<Vec<Value>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let documents = match serde_json::from_str(&text)? {
        Value::Array(documents) => documents,
        single => vec![single],
    };
    info!(path = %path.display(), count = documents.len(), "Loaded labels");
    Ok(documents)
}

/// Imports labels into a [`DocumentStore`].
///
/// Schema validation, image rewriting and classification are optional
/// collaborators; without them the importer only enforces identity and
/// deduplicates by content hash.
pub struct Importer<S: DocumentStore> {
    store: S,
    validator: Option<Box<dyn DocumentValidator>>,
    image_lookup: Option<Arc<dyn ImageIdLookup>>,
    classifier: Option<Arc<dyn Classifier>>,
}

impl<S: DocumentStore> Importer<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            validator: None,
            image_lookup: None,
            classifier: None,
        }
    }

    pub fn with_validator(mut self, validator: impl DocumentValidator + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn with_image_lookup(mut self, lookup: Arc<dyn ImageIdLookup>) -> Self {
        self.image_lookup = Some(lookup);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Import a batch. Failures are recorded per document and never stop
    /// the batch.
    pub async fn process<I>(&self, documents: I) -> ImportSummary
    where
        I: IntoIterator<Item = Value>,
    {
        let mut summary = ImportSummary::new();

        for (index, document) in documents.into_iter().enumerate() {
            match self.process_one(document).await {
                Ok(report) => summary.record(report),
                Err(e) => {
                    warn!(document = index + 1, error = %e, "Failed to import document");
                    summary.record_failure(index, e);
                }
            }
        }

        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            ai_enhanced = summary.ai_enhanced,
            ai_failed = summary.ai_failed,
            "Import complete"
        );
        summary
    }

    /// Validate a batch without touching the store or any external service.
    pub fn dry_run(&self, documents: &[Value]) -> DryRunReport {
        let mut report = DryRunReport::default();
        for (index, document) in documents.iter().enumerate() {
            match self.check(document) {
                Ok(_) => report.valid += 1,
                Err(e) => {
                    report.invalid += 1;
                    report.errors.push(format!("Document {}: {}", index + 1, e));
                }
            }
        }
        report
    }

    /// Import one document.
    pub async fn process_one(&self, document: Value) -> Result<DocumentReport> {
        let slug = self.check(&document)?.to_string();
        let mut document = DrugDocument::from_value(document)
            .map_err(|_| IngestError::NotAnObject)?
            .without_system_fields();

        if let Some(lookup) = &self.image_lookup {
            document = self.rewrite_images(lookup.as_ref(), document).await;
        }

        let existing = self.store.find_by_slug(&slug).await?;
        let outcome = self.classify(&document).await;

        let (action, enrichment) = match existing {
            Some(existing) => {
                let (document, enrichment) = enrich(document, outcome.as_ref(), Some(&existing));
                let hash = document_hash(&document);
                (self.update_if_changed(&existing, document, hash).await?, enrichment)
            }
            None => self.insert(&slug, document, outcome.as_ref()).await?,
        };

        info!(slug = %slug, action = ?action, enrichment = ?enrichment, "Imported document");
        Ok(DocumentReport { action, enrichment })
    }

    /// Schema and identity checks. Returns the slug.
    fn check<'a>(&self, document: &'a Value) -> Result<&'a str> {
        if let Some(validator) = &self.validator {
            validator.validate(document).map_err(IngestError::Validation)?;
        }
        if !document.is_object() {
            return Err(IngestError::NotAnObject);
        }
        document
            .get("slug")
            .and_then(Value::as_str)
            .ok_or(IngestError::MissingSlug)
    }

    async fn rewrite_images(&self, lookup: &dyn ImageIdLookup, document: DrugDocument) -> DrugDocument {
        let Some(drug_name) = document.drug_name().map(str::to_string) else {
            warn!(slug = ?document.slug(), "No drugName; image URLs left unchanged");
            return document;
        };
        let Some(spl_id) = lookup.spl_link_id(&drug_name).await else {
            debug!(drug = %drug_name, "No SPL image directory found");
            return document;
        };

        let (document, count) = rewrite_document_images(document, &spl_id);
        if count > 0 {
            debug!(drug = %drug_name, count, "Rewrote image URLs");
        }
        document
    }

    async fn classify(&self, document: &DrugDocument) -> Option<ClassificationOutcome> {
        let classifier = self.classifier.as_ref().filter(|c| c.is_enabled())?;
        Some(classifier.classify(document).await)
    }

    async fn insert(
        &self,
        slug: &str,
        document: DrugDocument,
        outcome: Option<&ClassificationOutcome>,
    ) -> Result<(ImportAction, Enrichment)> {
        let (enriched, enrichment) = enrich(document.clone(), outcome, None);
        let hash = document_hash(&enriched);
        let stored = StoredDocument::new(slug, enriched, hash, Utc::now());

        match self.store.insert(&stored).await {
            Ok(()) => Ok((ImportAction::Inserted, enrichment)),
            Err(StoreError::DuplicateSlug(_)) => {
                // Lost a race with another writer: merge against theirs and compare once.
                debug!(slug, "Duplicate slug on insert; re-reading");
                let Some(existing) = self.store.find_by_slug(slug).await? else {
                    return Err(StoreError::DuplicateSlug(slug.to_string()).into());
                };
                let (document, enrichment) = enrich(document, outcome, Some(&existing));
                let hash = document_hash(&document);
                let action = self.update_if_changed(&existing, document, hash).await?;
                Ok((action, enrichment))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_if_changed(
        &self,
        existing: &StoredDocument,
        document: DrugDocument,
        hash: String,
    ) -> Result<ImportAction> {
        if existing.hash == hash {
            debug!(slug = %existing.slug, "Content unchanged");
            return Ok(ImportAction::Skipped);
        }

        let replacement = existing.replaced_by(document, hash, Utc::now());
        if !self.store.update(&replacement).await? {
            return Err(IngestError::UpdateMissed {
                slug: existing.slug.clone(),
            });
        }
        Ok(ImportAction::Updated)
    }
}

/// Apply a classification outcome. A degraded outcome keeps the stored
/// document's enrichment when there is one.
fn enrich(
    document: DrugDocument,
    outcome: Option<&ClassificationOutcome>,
    existing: Option<&StoredDocument>,
) -> (DrugDocument, Enrichment) {
    let Some(outcome) = outcome else {
        return (document, Enrichment::None);
    };
    if !outcome.is_degraded() {
        return (merge_classification(document, outcome), Enrichment::Enhanced);
    }

    if let Some((class, metadata)) = existing.and_then(|e| stored_enrichment(&e.document)) {
        warn!(
            slug = ?document.slug(),
            "Classification failed; keeping stored classification"
        );
        let document = document
            .with(CLASSIFICATION_FIELD, class)
            .with(PROCESSING_METADATA_FIELD, metadata);
        return (document, Enrichment::Reused);
    }

    warn!(slug = ?document.slug(), "Classification failed; storing default classification");
    (merge_classification(document, outcome), Enrichment::Degraded)
}

/// Merge a classification outcome into the document's enrichment fields.
pub fn merge_classification(document: DrugDocument, outcome: &ClassificationOutcome) -> DrugDocument {
    let metadata = &outcome.metadata;
    document
        .with(CLASSIFICATION_FIELD, outcome.classification.to_value())
        .with(
            PROCESSING_METADATA_FIELD,
            json!({
                "processedAt": Utc::now().to_rfc3339(),
                "modelUsed": metadata.model,
                "confidence": outcome.classification.confidence_level.as_str(),
                "tokensUsed": metadata.tokens_used,
                "processingTimeMs": metadata.processing_time * 1000.0,
                "cached": outcome.cached,
            }),
        )
}

fn stored_enrichment(document: &DrugDocument) -> Option<(Value, Value)> {
    let class = document.get(CLASSIFICATION_FIELD)?.clone();
    let metadata = document
        .get(PROCESSING_METADATA_FIELD)
        .cloned()
        .unwrap_or(Value::Null);
    Some((class, metadata))
}
