//! Broadcast delivery boundary.
//!
//! The engine never talks to sockets. It names a logical [`Scope`] and hands
//! an event to the [`Broadcaster`], which fans it out to every connection
//! registered under that scope.

use std::fmt;

use serde_json::Value;

use crate::ids::{ParticipantId, SessionId};

/// A logical delivery group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every connected client.
    All,
    /// Every participant of one session.
    Session(SessionId),
    /// Every member of one team within a session.
    Team {
        /// Owning session.
        session: SessionId,
        /// Team index within the session.
        team: usize,
    },
    /// A single participant's own connection.
    Participant(ParticipantId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Session(session) => write!(f, "session:{session}"),
            Self::Team { session, team } => write!(f, "team:{session}-{team}"),
            Self::Participant(participant) => write!(f, "participant:{participant}"),
        }
    }
}

/// Fire-and-forget delivery to connections grouped by scope.
///
/// Implementations must not block: they are called from request handlers
/// and from the background phase pipeline alike.
pub trait Broadcaster: Send + Sync {
    /// Delivers `payload` as event `event_name` to every connection currently
    /// registered under `scope`. Connections registered later miss it.
    fn send_to_scope(&self, scope: &Scope, event_name: &str, payload: Value);

    /// Adds `connection` to `scope`. Registering twice is a no-op.
    fn register_connection(&self, connection: &ParticipantId, scope: &Scope);
}
