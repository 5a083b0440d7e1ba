//! Collaborators shared by every session.

use std::sync::{Arc, Mutex, PoisonError};

use transmission_core::broadcast::Broadcaster;
use transmission_core::clock::Clock;
use transmission_core::images::ImageProvider;
use transmission_core::rng::DeterministicRng;
use transmission_core::timer::Timer;

/// Injected clock, randomness, delays, delivery, and image search.
#[derive(Clone)]
pub struct MatchServices {
    /// Wall-clock source.
    pub clock: Arc<dyn Clock + Send + Sync>,
    /// Randomness for keyword and target selection.
    pub rng: Arc<Mutex<dyn DeterministicRng + Send>>,
    /// Delay source for the pipeline and relay latency.
    pub timer: Arc<dyn Timer>,
    /// Event delivery.
    pub broadcaster: Arc<dyn Broadcaster>,
    /// Candidate image search.
    pub images: Arc<dyn ImageProvider>,
}

impl std::fmt::Debug for MatchServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchServices").finish_non_exhaustive()
    }
}

impl MatchServices {
    /// Draws a value in `[min, max]` from the shared RNG.
    ///
    /// A poisoned lock still holds a usable generator, so it is recovered.
    pub fn random_in(&self, min: u32, max: u32) -> u32 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_u32_range(min, max)
    }
}
