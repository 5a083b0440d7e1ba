//! WebSocket connection hub.
//!
//! Tracks the outbound channel of every open socket and which scopes each
//! connection belongs to, and implements [`Broadcaster`] on top of them.
//! Sends never block: each socket task drains its own unbounded channel.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use transmission_core::broadcast::{Broadcaster, Scope};
use transmission_core::ids::ParticipantId;

/// Server-initiated frame.
#[derive(Debug, Serialize)]
pub struct PushFrame<'a> {
    /// Event name.
    pub event: &'a str,
    /// Event payload.
    pub data: Value,
}

#[derive(Debug, Default)]
struct Connections {
    outbound: HashMap<ParticipantId, mpsc::UnboundedSender<String>>,
    scopes: HashMap<Scope, HashSet<ParticipantId>>,
}

/// Registry of live sockets and their scope memberships.
#[derive(Debug, Default)]
pub struct WsHub {
    inner: RwLock<Connections>,
}

impl WsHub {
    /// Creates a hub with no connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and returns the channel its socket task must
    /// drain.
    pub fn connect(&self, connection: &ParticipantId) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.write().outbound.insert(connection.clone(), tx);
        debug!(%connection, "connection registered");
        rx
    }

    /// Forgets a connection and every scope membership it held.
    pub fn disconnect(&self, connection: &ParticipantId) {
        let mut inner = self.write();
        inner.outbound.remove(connection);
        inner.scopes.retain(|_, members| {
            members.remove(connection);
            !members.is_empty()
        });
        debug!(%connection, "connection removed");
    }

    /// Queues a raw frame for one connection. Returns false if it is gone.
    pub fn send_frame(&self, connection: &ParticipantId, frame: String) -> bool {
        self.read()
            .outbound
            .get(connection)
            .is_some_and(|tx| tx.send(frame).is_ok())
    }

    /// Number of open connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.read().outbound.len()
    }

    /// Connections registered under `scope`.
    #[must_use]
    pub fn members(&self, scope: &Scope) -> HashSet<ParticipantId> {
        self.read().scopes.get(scope).cloned().unwrap_or_default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Connections> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Connections> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Broadcaster for WsHub {
    fn send_to_scope(&self, scope: &Scope, event_name: &str, payload: Value) {
        let frame = match serde_json::to_string(&PushFrame {
            event: event_name,
            data: payload,
        }) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(event = event_name, "failed to encode push frame: {e}");
                return;
            }
        };

        let inner = self.read();
        let recipients: Vec<&mpsc::UnboundedSender<String>> = match scope {
            Scope::All => inner.outbound.values().collect(),
            Scope::Participant(id) => inner.outbound.get(id).into_iter().collect(),
            scoped => inner
                .scopes
                .get(scoped)
                .into_iter()
                .flatten()
                .filter_map(|id| inner.outbound.get(id))
                .collect(),
        };

        debug!(%scope, event = event_name, recipients = recipients.len(), "pushing event");
        for tx in recipients {
            // A closed channel means the socket is going away; disconnect
            // cleans up after it.
            let _ = tx.send(frame.clone());
        }
    }

    fn register_connection(&self, connection: &ParticipantId, scope: &Scope) {
        let mut inner = self.write();
        if !inner.outbound.contains_key(connection) {
            debug!(%connection, %scope, "ignoring scope registration for unknown connection");
            return;
        }
        inner
            .scopes
            .entry(scope.clone())
            .or_default()
            .insert(connection.clone());
    }
}
