//! Test image providers.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use transmission_core::images::{ImageCandidate, ImageProvider, ImageSearchError};

/// Returns the same candidates for every keyword and counts searches.
#[derive(Debug)]
pub struct StaticImageProvider {
    candidates: Vec<ImageCandidate>,
    searches: AtomicUsize,
}

impl StaticImageProvider {
    /// Serves `candidates` for every search.
    #[must_use]
    pub fn new(candidates: Vec<ImageCandidate>) -> Self {
        Self {
            candidates,
            searches: AtomicUsize::new(0),
        }
    }

    /// Serves `count` candidates at `https://img.test/{i}.jpg`.
    #[must_use]
    pub fn with_count(count: usize) -> Self {
        Self::new(
            (0..count)
                .map(|i| ImageCandidate::new(format!("https://img.test/{i}.jpg")))
                .collect(),
        )
    }

    /// Number of searches performed.
    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageProvider for StaticImageProvider {
    async fn search(&self, _keyword: &str) -> Result<Vec<ImageCandidate>, ImageSearchError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.candidates.clone())
    }
}

/// An image provider that always fails. Useful for testing pipeline failure.
#[derive(Debug)]
pub struct FailingImageProvider;

#[async_trait]
impl ImageProvider for FailingImageProvider {
    async fn search(&self, _keyword: &str) -> Result<Vec<ImageCandidate>, ImageSearchError> {
        Err(ImageSearchError::Request("connection refused".into()))
    }
}
