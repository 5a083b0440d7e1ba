//! Google Custom Search image provider.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use transmission_core::images::{ImageCandidate, ImageProvider, ImageSearchError};

use crate::config::GoogleSearchConfig;

/// Public Custom Search endpoint.
pub const GOOGLE_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Results requested per search; the API caps a page at ten.
const RESULTS_PER_SEARCH: &str = "10";

/// Searches large, safe-search-filtered images through the Custom Search
/// JSON API.
#[derive(Debug, Clone)]
pub struct GoogleImageSearch {
    client: reqwest::Client,
    endpoint: String,
    config: GoogleSearchConfig,
}

impl GoogleImageSearch {
    /// Creates a provider against the public endpoint.
    #[must_use]
    pub fn new(config: GoogleSearchConfig) -> Self {
        Self::with_endpoint(config, GOOGLE_SEARCH_ENDPOINT)
    }

    /// Creates a provider against a custom endpoint.
    #[must_use]
    pub fn with_endpoint(config: GoogleSearchConfig, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            config,
        }
    }
}

#[async_trait]
impl ImageProvider for GoogleImageSearch {
    async fn search(&self, keyword: &str) -> Result<Vec<ImageCandidate>, ImageSearchError> {
        debug!(keyword, "querying image search");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", keyword),
                ("cx", self.config.engine_id.as_str()),
                ("key", self.config.api_key.as_str()),
                ("searchType", "image"),
                ("imgSize", "large"),
                ("num", RESULTS_PER_SEARCH),
                ("safe", "high"),
            ])
            .send()
            .await
            .map_err(|e| ImageSearchError::Request(format!("image search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(ImageSearchError::Request(format!(
                "image search returned {status}: {error_body}"
            )));
        }

        let json: Value = response.json().await.map_err(|e| {
            ImageSearchError::Malformed(format!("image search response parse failed: {e}"))
        })?;

        extract_candidates(&json)
    }
}

/// Pulls `items[].link` out of a Custom Search response.
///
/// A response without `items` means no hits and yields an empty list.
///
/// # Errors
///
/// Returns `ImageSearchError::Malformed` if `items` is not an array or an
/// item carries no string `link`.
pub fn extract_candidates(json: &Value) -> Result<Vec<ImageCandidate>, ImageSearchError> {
    let Some(items) = json.get("items") else {
        return Ok(Vec::new());
    };
    let items = items
        .as_array()
        .ok_or_else(|| ImageSearchError::Malformed("items is not an array".to_owned()))?;

    items
        .iter()
        .map(|item| {
            item.get("link")
                .and_then(Value::as_str)
                .map(ImageCandidate::new)
                .ok_or_else(|| ImageSearchError::Malformed("item without a link".to_owned()))
        })
        .collect()
}
