//! Image search boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One search hit returned by an [`ImageProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCandidate {
    /// Source locator of the image.
    pub url: String,
}

impl ImageCandidate {
    /// Creates a candidate from its URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Failure reported by an image provider.
#[derive(Debug, Error)]
pub enum ImageSearchError {
    /// The provider could not be reached or answered with an error status.
    #[error("image search request failed: {0}")]
    Request(String),

    /// The provider answered but the response could not be understood.
    #[error("image search response malformed: {0}")]
    Malformed(String),
}

/// External image search used to populate a round's candidates.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Returns image candidates for `keyword`, in provider order.
    ///
    /// # Errors
    ///
    /// Returns [`ImageSearchError`] if the search cannot be completed.
    async fn search(&self, keyword: &str) -> Result<Vec<ImageCandidate>, ImageSearchError>;
}
