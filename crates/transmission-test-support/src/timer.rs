//! Test timers — run match timelines without real delays.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeDelta;
use tokio::sync::{Semaphore, watch};
use transmission_core::timer::Timer;

use crate::clock::ManualClock;

/// Completes every sleep immediately (after a yield) and records the
/// requested durations.
#[derive(Debug, Default)]
pub struct InstantTimer {
    requested: Mutex<Vec<Duration>>,
}

impl InstantTimer {
    /// Creates a timer with no recorded sleeps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Durations requested so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requested(&self) -> Vec<Duration> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Timer for InstantTimer {
    async fn sleep(&self, duration: Duration) {
        self.requested.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

/// Completes every sleep immediately after moving a [`ManualClock`] forward
/// by the requested duration, so clock readings follow the timeline.
#[derive(Debug)]
pub struct ClockedTimer {
    clock: Arc<ManualClock>,
    requested: Mutex<Vec<Duration>>,
}

impl ClockedTimer {
    /// Creates a timer that drives `clock`.
    #[must_use]
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Durations requested so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requested(&self) -> Vec<Duration> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Timer for ClockedTimer {
    async fn sleep(&self, duration: Duration) {
        self.requested.lock().unwrap().push(duration);
        self.clock
            .advance(TimeDelta::from_std(duration).unwrap_or_else(|_| TimeDelta::zero()));
        tokio::task::yield_now().await;
    }
}

/// Holds every sleep until the test releases it.
///
/// Each `sleep` records its duration and then waits for one permit. Tests
/// call [`StepTimer::wait_for_sleeps`] to learn that a task has reached a
/// suspension point and [`StepTimer::release`] to let sleepers continue, in
/// arrival order.
#[derive(Debug)]
pub struct StepTimer {
    requested: Mutex<Vec<Duration>>,
    permits: Semaphore,
    arrivals: watch::Sender<usize>,
}

impl Default for StepTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl StepTimer {
    /// Creates a timer with every sleep blocked.
    #[must_use]
    pub fn new() -> Self {
        let (arrivals, _) = watch::channel(0);
        Self {
            requested: Mutex::new(Vec::new()),
            permits: Semaphore::new(0),
            arrivals,
        }
    }

    /// Lets `count` pending or future sleeps complete.
    pub fn release(&self, count: usize) {
        self.permits.add_permits(count);
    }

    /// Waits until at least `count` sleeps have been requested in total.
    ///
    /// # Panics
    ///
    /// Panics if the timer is dropped while waiting.
    pub async fn wait_for_sleeps(&self, count: usize) {
        let mut rx = self.arrivals.subscribe();
        rx.wait_for(|arrived| *arrived >= count)
            .await
            .expect("timer dropped while waiting");
    }

    /// Durations requested so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requested(&self) -> Vec<Duration> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Timer for StepTimer {
    async fn sleep(&self, duration: Duration) {
        self.requested.lock().unwrap().push(duration);
        self.arrivals.send_modify(|arrived| *arrived += 1);
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}
