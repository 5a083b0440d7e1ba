//! Cooperative delay abstraction.
//!
//! The phase pipeline and the first-relay latency suspend through [`Timer`]
//! rather than calling the runtime directly, so tests can run the whole
//! match timeline without waiting in real time.

use std::time::Duration;

use async_trait::async_trait;

/// Suspends the current task for a logical duration.
#[async_trait]
pub trait Timer: Send + Sync {
    /// Completes once `duration` has elapsed.
    async fn sleep(&self, duration: Duration);
}

/// Production timer backed by the Tokio time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
