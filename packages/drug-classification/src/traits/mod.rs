//! Seams between the classification pipeline and its collaborators.
//!
//! Applications plug in a completion provider, a cache backend, or consume
//! classification through [`classifier::Classifier`] without naming the
//! concrete types.

pub mod cache_store;
pub mod classifier;
pub mod completion;
