//! Shared test doubles for the Transmission match engine.

mod broadcast;
mod clock;
mod images;
mod rng;
mod timer;

pub use broadcast::{RecordingBroadcaster, SentEvent};
pub use clock::{FixedClock, ManualClock};
pub use images::{FailingImageProvider, StaticImageProvider};
pub use rng::{MockRng, SequenceRng};
pub use timer::{ClockedTimer, InstantTimer, StepTimer};
