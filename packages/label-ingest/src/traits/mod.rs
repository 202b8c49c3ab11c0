//! Trait definitions for ingestion collaborators.
//!
//! - [`store::DocumentStore`] - Persistence keyed by slug
//! - [`validator::DocumentValidator`] - Structural checks on incoming labels
//! - [`image_lookup::ImageIdLookup`] - SPL image directory lookup

pub mod image_lookup;
pub mod store;
pub mod validator;
