//! Round images and vote tallies.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;
use transmission_core::error::DomainError;
use transmission_core::images::ImageCandidate;

use super::events::MatchResult;

/// One candidate image with its running vote tally.
#[derive(Debug)]
pub struct Image {
    index: usize,
    url: String,
    votes: AtomicU32,
}

impl Image {
    /// Creates an image with no votes.
    #[must_use]
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
            votes: AtomicU32::new(0),
        }
    }

    /// Position in the candidate list.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Source locator.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current tally.
    #[must_use]
    pub fn votes(&self) -> u32 {
        self.votes.load(Ordering::Acquire)
    }

    /// Adds one vote and returns the new tally.
    pub fn cast_vote(&self) -> u32 {
        self.votes.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    /// Snapshot suitable for a client payload.
    #[must_use]
    pub fn view(&self) -> ImageView {
        ImageView {
            index: self.index,
            url: self.url.clone(),
            votes: self.votes(),
        }
    }
}

/// Serializable snapshot of an [`Image`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageView {
    /// Position in the candidate list.
    pub index: usize,
    /// Source locator.
    pub url: String,
    /// Tally at snapshot time.
    pub votes: u32,
}

/// The candidates chosen for a round, with the target fixed at construction.
#[derive(Debug)]
pub struct RoundImages {
    keyword: String,
    target: usize,
    images: Vec<Image>,
}

impl RoundImages {
    /// Builds the round from provider candidates.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OutOfRange` if `target` does not address one of
    /// `candidates`, which also covers an empty candidate list.
    pub fn new(
        keyword: impl Into<String>,
        target: usize,
        candidates: Vec<ImageCandidate>,
    ) -> Result<Self, DomainError> {
        if target >= candidates.len() {
            return Err(DomainError::OutOfRange {
                what: "target image",
                index: target,
                len: candidates.len(),
            });
        }
        let images = candidates
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| Image::new(index, candidate.url))
            .collect();
        Ok(Self {
            keyword: keyword.into(),
            target,
            images,
        })
    }

    /// The search keyword the candidates came from.
    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Index of the target image.
    #[must_use]
    pub fn target(&self) -> usize {
        self.target
    }

    /// The target image.
    #[must_use]
    pub fn target_image(&self) -> &Image {
        &self.images[self.target]
    }

    /// All candidates in order.
    #[must_use]
    pub fn images(&self) -> &[Image] {
        &self.images
    }

    /// Snapshots of all candidates.
    #[must_use]
    pub fn views(&self) -> Vec<ImageView> {
        self.images.iter().map(Image::view).collect()
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether there are no candidates. Never true for a constructed round.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Records a vote for `index` and returns the new tally.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OutOfRange` if `index` is not a candidate.
    pub fn cast_vote(&self, index: usize) -> Result<u32, DomainError> {
        let image = self.images.get(index).ok_or(DomainError::OutOfRange {
            what: "image",
            index,
            len: self.images.len(),
        })?;
        Ok(image.cast_vote())
    }

    /// Builds the terminal result for this round.
    ///
    /// `voted` is the chosen index for a vote-decided round and `None` for a
    /// timeout.
    #[must_use]
    pub fn result(&self, voted: Option<usize>) -> MatchResult {
        MatchResult {
            correct: self.target,
            correct_url: self.target_image().url().to_owned(),
            keyword: self.keyword.clone(),
            matched: voted.map(|index| index == self.target),
            timed_out: voted.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(n: usize) -> Vec<ImageCandidate> {
        (0..n)
            .map(|i| ImageCandidate::new(format!("https://img.test/{i}.jpg")))
            .collect()
    }

    #[test]
    fn test_new_rejects_target_outside_candidates() {
        let result = RoundImages::new("lion", 3, candidates(3));

        assert!(matches!(
            result.unwrap_err(),
            DomainError::OutOfRange { index: 3, len: 3, .. }
        ));
    }

    #[test]
    fn test_new_rejects_empty_candidates() {
        assert!(RoundImages::new("lion", 0, Vec::new()).is_err());
    }

    #[test]
    fn test_cast_vote_increments_only_the_chosen_image() {
        let round = RoundImages::new("lion", 1, candidates(4)).unwrap();

        assert_eq!(round.cast_vote(2).unwrap(), 1);
        assert_eq!(round.cast_vote(2).unwrap(), 2);

        let tallies: Vec<u32> = round.images().iter().map(Image::votes).collect();
        assert_eq!(tallies, vec![0, 0, 2, 0]);
    }

    #[test]
    fn test_cast_vote_out_of_range_leaves_tallies_untouched() {
        let round = RoundImages::new("lion", 1, candidates(2)).unwrap();

        assert!(round.cast_vote(5).is_err());
        assert!(round.images().iter().all(|image| image.votes() == 0));
    }

    #[test]
    fn test_result_for_vote_and_timeout() {
        let round = RoundImages::new("girl on the beach", 1, candidates(3)).unwrap();

        let hit = round.result(Some(1));
        assert_eq!(hit.matched, Some(true));
        assert!(!hit.timed_out);
        assert_eq!(hit.correct_url, "https://img.test/1.jpg");

        let miss = round.result(Some(0));
        assert_eq!(miss.matched, Some(false));

        let timeout = round.result(None);
        assert_eq!(timeout.matched, None);
        assert!(timeout.timed_out);
        assert_eq!(timeout.keyword, "girl on the beach");
    }
}
