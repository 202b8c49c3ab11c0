//! Lookup of the SPL image directory for a drug.

use async_trait::async_trait;

/// Resolves a drug name to the identifier of its SPL image directory.
///
/// Lookups never fail the caller; errors resolve to `None`.
#[async_trait]
pub trait ImageIdLookup: Send + Sync {
    async fn spl_link_id(&self, drug_name: &str) -> Option<String>;
}
