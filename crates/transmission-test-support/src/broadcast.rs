//! Test broadcaster — records every delivery for later assertions.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;
use transmission_core::broadcast::{Broadcaster, Scope};
use transmission_core::clock::Clock;
use transmission_core::ids::ParticipantId;

/// One recorded `send_to_scope` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SentEvent {
    /// Target scope.
    pub scope: Scope,
    /// Event name.
    pub name: String,
    /// Event payload.
    pub payload: Value,
    /// Clock reading at send time, when the recorder has a clock.
    pub at: Option<DateTime<Utc>>,
}

/// A broadcaster that records sends and registrations instead of delivering
/// them, and lets async tests wait until a given event has been sent.
pub struct RecordingBroadcaster {
    clock: Option<Arc<dyn Clock>>,
    sent: Mutex<Vec<SentEvent>>,
    registrations: Mutex<Vec<(ParticipantId, Scope)>>,
    sent_count: watch::Sender<usize>,
}

impl std::fmt::Debug for RecordingBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingBroadcaster")
            .field("stamped", &self.clock.is_some())
            .field("sent", &self.sent)
            .finish_non_exhaustive()
    }
}

impl Default for RecordingBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBroadcaster {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        let (sent_count, _) = watch::channel(0);
        Self {
            clock: None,
            sent: Mutex::new(Vec::new()),
            registrations: Mutex::new(Vec::new()),
            sent_count,
        }
    }

    /// Creates a recorder that stamps each event with `clock`'s reading.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock: Some(clock),
            ..Self::new()
        }
    }

    /// Returns a snapshot of every event sent so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn sent(&self) -> Vec<SentEvent> {
        self.sent.lock().unwrap().clone()
    }

    /// Returns the events sent under `name`, in order.
    pub fn named(&self, name: &str) -> Vec<SentEvent> {
        self.sent().into_iter().filter(|e| e.name == name).collect()
    }

    /// Returns the events sent to `scope`, in order.
    pub fn sent_to(&self, scope: &Scope) -> Vec<SentEvent> {
        self.sent()
            .into_iter()
            .filter(|e| &e.scope == scope)
            .collect()
    }

    /// Returns a snapshot of every registration.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn registrations(&self) -> Vec<(ParticipantId, Scope)> {
        self.registrations.lock().unwrap().clone()
    }

    /// Waits until at least `count` events named `name` have been sent.
    ///
    /// # Panics
    ///
    /// Panics if the recorder is dropped while waiting.
    pub async fn wait_for(&self, name: &str, count: usize) {
        let mut rx = self.sent_count.subscribe();
        rx.wait_for(|_| self.named(name).len() >= count)
            .await
            .expect("recorder dropped while waiting");
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn send_to_scope(&self, scope: &Scope, event_name: &str, payload: Value) {
        self.sent.lock().unwrap().push(SentEvent {
            scope: scope.clone(),
            name: event_name.to_owned(),
            payload,
            at: self.clock.as_ref().map(|clock| clock.now()),
        });
        self.sent_count.send_modify(|count| *count += 1);
    }

    fn register_connection(&self, connection: &ParticipantId, scope: &Scope) {
        self.registrations
            .lock()
            .unwrap()
            .push((connection.clone(), scope.clone()));
    }
}
