//! Fixtures shared by the application-layer tests.

use std::sync::{Arc, Mutex};

use transmission_core::broadcast::Broadcaster;
use transmission_core::clock::Clock;
use transmission_core::images::ImageProvider;
use transmission_core::rng::DeterministicRng;
use transmission_core::timer::Timer;
use transmission_test_support::{FixedClock, RecordingBroadcaster};

use super::services::MatchServices;

/// Test doubles wired into a [`MatchServices`], with typed handles kept for
/// assertions.
pub(crate) struct Harness<T> {
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub timer: Arc<T>,
    pub services: MatchServices,
}

impl<T: Timer + 'static> Harness<T> {
    pub fn new(
        timer: T,
        rng: impl DeterministicRng + Send + 'static,
        images: Arc<dyn ImageProvider>,
    ) -> Self {
        Self::with_clock(
            timer,
            rng,
            images,
            Arc::new(FixedClock::default_instant()),
        )
    }

    /// Like [`Harness::new`], but on `clock`. Recorded events carry its
    /// reading at send time.
    pub fn with_clock(
        timer: T,
        rng: impl DeterministicRng + Send + 'static,
        images: Arc<dyn ImageProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let broadcaster = Arc::new(RecordingBroadcaster::with_clock(Arc::clone(&clock)));
        let timer = Arc::new(timer);
        let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(rng));
        let services = MatchServices {
            clock,
            rng,
            timer: Arc::clone(&timer) as Arc<dyn Timer>,
            broadcaster: Arc::clone(&broadcaster) as Arc<dyn Broadcaster>,
            images,
        };
        Self {
            broadcaster,
            timer,
            services,
        }
    }
}
