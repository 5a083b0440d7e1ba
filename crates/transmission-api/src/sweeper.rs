//! Periodic eviction of ended sessions and abandoned lobbies.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;
use transmission_match::application::registry::SessionRegistry;

/// How long sessions may linger, and how often to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    /// How long an ended session stays registered.
    pub retention: Duration,
    /// How long a session may wait for its teams to fill.
    pub lobby_ttl: Duration,
    /// Time between sweeps.
    pub interval: Duration,
}

/// Removes sessions that ended more than `retention` ago and sessions that
/// never started within `lobby_ttl` of creation. Returns how many were
/// removed.
pub fn sweep_once(registry: &SessionRegistry, policy: &SweepPolicy) -> usize {
    let now = registry.services().clock.now();
    registry.prune_ended(cutoff(now, policy.retention))
        + registry.prune_abandoned(cutoff(now, policy.lobby_ttl))
}

// An age too large to subtract keeps everything.
fn cutoff(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Sweeps every `policy.interval` until the task is aborted.
pub async fn run(registry: Arc<SessionRegistry>, policy: SweepPolicy) {
    let mut ticker = tokio::time::interval(policy.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let removed = sweep_once(&registry, &policy);
        debug!(removed, "session sweep finished");
    }
}
