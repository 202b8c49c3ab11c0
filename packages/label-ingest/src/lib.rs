//! Idempotent Ingestion of FDA Drug Labels
//!
//! Loads drug label documents into a slug-keyed store. Every document is
//! fingerprinted after enrichment; unchanged documents are skipped, changed
//! ones replace the stored content and new ones are inserted.
//!
//! # Pipeline
//!
//! ```text
//! JSON label
//!   → schema validation (optional)
//!   → identity check (`slug`)
//!   → image URL rewriting (optional)
//!   → therapeutic classification (optional)
//!   → content hash → insert / update / skip
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use label_ingest::{read_documents, Importer, MemoryDocumentStore, SchemaValidator};
//!
//! let importer = Importer::new(MemoryDocumentStore::new())
//!     .with_validator(SchemaValidator::from_file("drug_label_schema.yaml")?);
//!
//! let summary = importer.process(read_documents("Labels.json")?).await;
//! println!("{} inserted, {} skipped", summary.inserted, summary.skipped);
//! ```
//!
//! # Modules
//!
//! - [`importer`] - The ingestion engine
//! - [`schema`] - JSON Schema validator
//! - [`images`] - `<img src>` rewriting and SPL id lookup
//! - [`stores`] - Document store implementations
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod images;
pub mod importer;
pub mod schema;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{IngestError, Result, StoreError, StoreResult};
pub use images::{rewrite_image_urls, FdaLabelSearch, SPL_IMAGE_BASE_URL};
pub use importer::{merge_classification, read_documents, Importer};
pub use schema::SchemaValidator;
pub use traits::{
    image_lookup::ImageIdLookup, store::DocumentStore, validator::DocumentValidator,
};
pub use types::{
    stored::StoredDocument,
    summary::{DocumentReport, DryRunReport, Enrichment, ImportAction, ImportSummary},
};

// Re-export stores
pub use stores::MemoryDocumentStore;

#[cfg(feature = "sqlite")]
pub use stores::SqliteDocumentStore;
