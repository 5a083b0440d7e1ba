//! Commands for the match context.

use serde_json::Value;
use transmission_core::command::Command;
use transmission_core::ids::{ParticipantId, SessionId};
use uuid::Uuid;

/// Command to open a new session under a caller-chosen id.
#[derive(Debug, Clone)]
pub struct CreateSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The id to register.
    pub session_id: SessionId,
}

impl Command for CreateSession {
    fn command_type(&self) -> &'static str {
        "match.create_session"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}

/// Command to take a seat in one of a session's teams.
#[derive(Debug, Clone)]
pub struct JoinSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The session to join.
    pub session_id: SessionId,
    /// Team index.
    pub team: usize,
    /// Opaque client profile.
    pub profile: Value,
    /// The caller's identity.
    pub caller: ParticipantId,
}

impl Command for JoinSession {
    fn command_type(&self) -> &'static str {
        "match.join_session"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}

/// Command to relay a draw command to the next teammate.
#[derive(Debug, Clone)]
pub struct SubmitDrawCommand {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The session the caller plays in.
    pub session_id: SessionId,
    /// Opaque draw command.
    pub payload: Value,
    /// The caller's identity.
    pub caller: ParticipantId,
}

impl Command for SubmitDrawCommand {
    fn command_type(&self) -> &'static str {
        "match.submit_draw_command"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}

/// Command to vote for a candidate image.
#[derive(Debug, Clone)]
pub struct SubmitVote {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The session being voted in.
    pub session_id: SessionId,
    /// Index of the chosen candidate.
    pub image_index: usize,
    /// The caller's identity.
    pub caller: ParticipantId,
}

impl Command for SubmitVote {
    fn command_type(&self) -> &'static str {
        "match.submit_vote"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}
