//! A label as persisted by a document store.

use chrono::{DateTime, SecondsFormat, Utc};
use drug_classification::DrugDocument;
use serde_json::Value;

/// Label content plus the system fields the importer maintains.
///
/// `document` never contains `_hash`, `_created_at` or `_updated_at`; those
/// live on the struct and are only merged back by [`StoredDocument::to_json`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Identity key, copied from the document's `slug`
    pub slug: String,

    pub document: DrugDocument,

    /// Content hash (`_hash`)
    pub hash: String,

    /// First insert (`_created_at`), never changed by updates
    pub created_at: DateTime<Utc>,

    /// Last accepted write (`_updated_at`)
    pub updated_at: DateTime<Utc>,
}

impl StoredDocument {
    /// A freshly inserted document.
    pub fn new(
        slug: impl Into<String>,
        document: DrugDocument,
        hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            slug: slug.into(),
            document: document.without_system_fields(),
            hash: hash.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replacement content for this document, keeping `created_at`.
    pub fn replaced_by(&self, document: DrugDocument, hash: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            slug: self.slug.clone(),
            document: document.without_system_fields(),
            hash: hash.into(),
            created_at: self.created_at,
            updated_at: now,
        }
    }

    /// The document as a single JSON object with system fields included.
    pub fn to_json(&self) -> Value {
        let mut map = self.document.as_map().clone();
        map.insert("_hash".into(), Value::String(self.hash.clone()));
        map.insert("_created_at".into(), Value::String(rfc3339(self.created_at)));
        map.insert("_updated_at".into(), Value::String(rfc3339(self.updated_at)));
        Value::Object(map)
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn document() -> DrugDocument {
        DrugDocument::new()
            .with("slug", "ozempic-adec4fd")
            .with("drugName", "Ozempic")
    }

    #[test]
    fn test_system_fields_are_not_kept_in_content() {
        let now = Utc::now();
        let stored = StoredDocument::new(
            "ozempic-adec4fd",
            document().with("_hash", "stale").with("_id", "abc"),
            "h1",
            now,
        );

        assert_eq!(stored.document, document());
        assert_eq!(stored.created_at, stored.updated_at);
    }

    #[test]
    fn test_replacement_keeps_created_at() {
        let created = Utc::now();
        let stored = StoredDocument::new("ozempic-adec4fd", document(), "h1", created);
        let later = created + Duration::hours(2);

        let replaced = stored.replaced_by(document().with("labeler", "Novo Nordisk"), "h2", later);

        assert_eq!(replaced.created_at, created);
        assert_eq!(replaced.updated_at, later);
        assert_eq!(replaced.hash, "h2");
        assert_eq!(replaced.document.get("labeler"), Some(&json!("Novo Nordisk")));
    }

    #[test]
    fn test_to_json_merges_system_fields() {
        let stored = StoredDocument::new("ozempic-adec4fd", document(), "h1", Utc::now());
        let value = stored.to_json();

        assert_eq!(value["_hash"], "h1");
        assert_eq!(value["_created_at"], value["_updated_at"]);
        assert_eq!(value["drugName"], "Ozempic");
    }
}
