//! Label image URL rewriting.
//!
//! FDA label HTML references figures by bare file name. Those are rewritten
//! to absolute URLs under the SPL data directory of the drug, looked up by
//! product name through the openFDA label search endpoint.

use async_trait::async_trait;
use drug_classification::DrugDocument;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;
use crate::traits::image_lookup::ImageIdLookup;

/// Base URL of SPL image directories.
pub const SPL_IMAGE_BASE_URL: &str = "https://www.accessdata.fda.gov/spl/data";

/// openFDA label search endpoint.
pub const FDA_LABEL_SEARCH_URL: &str = "https://api.fda.gov/drug/labelsearch.json";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

lazy_static! {
    static ref IMG_TAG: Regex =
        Regex::new(r#"(?i)<img([^>]*?)src=["']([^"']*?)["']([^>]*?)/?>"#).unwrap();
}

fn is_absolute(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://") || src.starts_with("//")
}

/// Rewrite relative `<img src>` attributes in an HTML fragment.
///
/// Returns the rewritten text and the number of tags changed.
pub fn rewrite_img_tags(html: &str, spl_id: &str) -> (String, usize) {
    let mut rewritten = 0;
    let text = IMG_TAG.replace_all(html, |caps: &Captures| {
        let src = &caps[2];
        if is_absolute(src) {
            return caps[0].to_string();
        }
        rewritten += 1;
        format!(
            "<img{}src=\"{}/{}/{}\"{}/>",
            &caps[1], SPL_IMAGE_BASE_URL, spl_id, src, &caps[3]
        )
    });
    (text.into_owned(), rewritten)
}

/// Rewrite image URLs in every string of a JSON tree. Returns the number of
/// tags changed.
pub fn rewrite_image_urls(value: &mut Value, spl_id: &str) -> usize {
    match value {
        Value::String(text) => {
            if !text.to_ascii_lowercase().contains("<img") {
                return 0;
            }
            let (rewritten, count) = rewrite_img_tags(text, spl_id);
            if count > 0 {
                *text = rewritten;
            }
            count
        }
        Value::Array(items) => items
            .iter_mut()
            .map(|item| rewrite_image_urls(item, spl_id))
            .sum(),
        Value::Object(map) => map
            .values_mut()
            .map(|item| rewrite_image_urls(item, spl_id))
            .sum(),
        _ => 0,
    }
}

/// Rewrite image URLs throughout a document.
pub fn rewrite_document_images(document: DrugDocument, spl_id: &str) -> (DrugDocument, usize) {
    let mut map = document.into_map();
    let count = map
        .values_mut()
        .map(|value| rewrite_image_urls(value, spl_id))
        .sum();
    (DrugDocument::from(map), count)
}

#[derive(Debug, Deserialize)]
struct LabelSearchResponse {
    #[serde(default)]
    results: Vec<LabelSearchResult>,
}

#[derive(Debug, Deserialize)]
struct LabelSearchResult {
    spl_link_id: Option<String>,
}

/// openFDA label search lookup with an in-memory memo.
///
/// Both hits and "no such product" answers are memoised; transport errors
/// are not, so a later call can retry.
pub struct FdaLabelSearch {
    http: Client,
    endpoint: String,
    memo: Mutex<HashMap<String, Option<String>>>,
}

impl FdaLabelSearch {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(FDA_LABEL_SEARCH_URL)
    }

    /// Use a different search endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        let http = Client::builder().timeout(LOOKUP_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            memo: Mutex::new(HashMap::new()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Number of memoised drug names.
    pub fn memoized(&self) -> usize {
        self.memo().len()
    }

    fn memo(&self) -> MutexGuard<'_, HashMap<String, Option<String>>> {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn search(&self, drug_name: &str) -> std::result::Result<Option<String>, reqwest::Error> {
        let search = format!("product_name:{}", drug_name);
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("search", search.as_str()), ("limit", "1000")])
            .header(ACCEPT, "*/*")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: LabelSearchResponse = response.error_for_status()?.json().await?;
        Ok(body
            .results
            .into_iter()
            .next()
            .and_then(|result| result.spl_link_id))
    }
}

#[async_trait]
impl ImageIdLookup for FdaLabelSearch {
    /// Answers, including "not found", are memoised per drug name. Transport
    /// errors are not, so a later document for the same drug retries.
    async fn spl_link_id(&self, drug_name: &str) -> Option<String> {
        if let Some(known) = self.memo().get(drug_name) {
            return known.clone();
        }

        match self.search(drug_name).await {
            Ok(id) => {
                debug!(drug = drug_name, spl_link_id = ?id, "Resolved SPL image directory");
                self.memo().insert(drug_name.to_string(), id.clone());
                id
            }
            Err(e) => {
                warn!(drug = drug_name, error = %e, "SPL lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SPL_ID: &str = "bfdfe235-d717-4855-a3c8-a13d26dadede";

    #[test]
    fn test_relative_src_is_rewritten() {
        let (html, count) = rewrite_img_tags(r#"<p><img alt="Figure 1" src="ozempic-01.jpg"></p>"#, SPL_ID);
        assert_eq!(count, 1);
        assert_eq!(
            html,
            format!(
                r#"<p><img alt="Figure 1" src="{}/{}/ozempic-01.jpg"/></p>"#,
                SPL_IMAGE_BASE_URL, SPL_ID
            )
        );
    }

    #[test]
    fn test_absolute_sources_are_untouched() {
        for src in ["https://cdn.example.org/a.jpg", "http://x/b.png", "//x/c.gif"] {
            let html = format!("<IMG src='{}' />", src);
            let (rewritten, count) = rewrite_img_tags(&html, SPL_ID);
            assert_eq!(count, 0);
            assert_eq!(rewritten, html);
        }
    }

    #[test]
    fn test_tag_matching_is_case_insensitive() {
        let (html, count) = rewrite_img_tags(r#"<IMG SRC="fig.jpg" width="100"/>"#, SPL_ID);
        assert_eq!(count, 1);
        assert!(html.ends_with(r#"/fig.jpg" width="100"/>"#));
    }

    #[test]
    fn test_nested_values_are_rewritten() {
        let mut value = json!({
            "label": {
                "clinicalStudies": "<img src=\"study.jpg\">",
                "tables": ["<img src=\"t1.jpg\"><img src=\"t2.jpg\">", 7]
            },
            "drugName": "Ozempic"
        });

        assert_eq!(rewrite_image_urls(&mut value, SPL_ID), 3);
        let studies = value["label"]["clinicalStudies"].as_str().unwrap();
        assert!(studies.contains(&format!("{}/{}/study.jpg", SPL_IMAGE_BASE_URL, SPL_ID)));
        assert_eq!(value["drugName"], "Ozempic");
        assert_eq!(value["label"]["tables"][1], 7);
    }

    #[test]
    fn test_document_rewrite() {
        let document = DrugDocument::new()
            .with("slug", "ozempic")
            .with("label", json!({ "description": "<img src=\"structure.jpg\"/>" }));

        let (rewritten, count) = rewrite_document_images(document, SPL_ID);
        assert_eq!(count, 1);
        assert!(rewritten
            .label_section("description")
            .unwrap()
            .contains(SPL_IMAGE_BASE_URL));
    }

    #[tokio::test]
    async fn test_transport_errors_are_not_memoised() {
        let lookup = FdaLabelSearch::with_endpoint("http://127.0.0.1:9/drug/labelsearch.json").unwrap();
        assert_eq!(lookup.spl_link_id("Ozempic").await, None);
        assert_eq!(lookup.memoized(), 0);
    }
}
