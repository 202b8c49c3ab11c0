//! Core data types for label ingestion.

pub mod stored;
pub mod summary;
