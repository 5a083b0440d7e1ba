//! Events broadcast to clients.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use transmission_core::ids::SessionId;

use super::images::ImageView;
use super::roles::Role;

/// Event name for [`MatchEvent::ParticipantJoined`].
pub const PARTICIPANT_JOINED_EVENT: &str = "participantJoined";

/// Event name for [`MatchEvent::RoleAssigned`].
pub const ROLE_ASSIGNED_EVENT: &str = "roleAssigned";

/// Event name for [`MatchEvent::MatchStarting`].
pub const MATCH_STARTING_EVENT: &str = "matchStarting";

/// Event name for [`MatchEvent::RoundStarted`].
pub const ROUND_STARTED_EVENT: &str = "roundStarted";

/// Event name for [`MatchEvent::CommandRelayed`].
pub const COMMAND_RELAYED_EVENT: &str = "commandRelayed";

/// Event name for [`MatchEvent::MatchEnded`].
pub const MATCH_ENDED_EVENT: &str = "matchEnded";

/// Event name for [`MatchEvent::MatchFailed`].
pub const MATCH_FAILED_EVENT: &str = "matchFailed";

/// Event name for [`MatchEvent::SessionListChanged`].
pub const SESSION_LIST_CHANGED_EVENT: &str = "sessionListChanged";

/// Per-participant briefing sent when the round begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundBriefing {
    /// The recipient's role.
    pub role: Role,
    /// The target image; spy only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<ImageView>,
    /// Every candidate; handler only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_images: Option<Vec<ImageView>>,
    /// Length of the round in milliseconds.
    pub match_duration_ms: u64,
}

/// Result of a round that reached a decision or timed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Index of the target image.
    pub correct: usize,
    /// URL of the target image.
    pub correct_url: String,
    /// Keyword the candidates were searched with.
    pub keyword: String,
    /// Whether the deciding vote hit the target; absent on timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<bool>,
    /// Whether the round ended by running out of time.
    pub timed_out: bool,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A vote or the timeout decided the round.
    Decided(MatchResult),
    /// The pipeline could not prepare the round.
    Failed {
        /// Human-readable cause.
        reason: String,
    },
}

impl MatchOutcome {
    /// The terminal event announcing this outcome.
    #[must_use]
    pub fn into_event(self) -> MatchEvent {
        match self {
            Self::Decided(result) => MatchEvent::MatchEnded(result),
            Self::Failed { reason } => MatchEvent::MatchFailed { reason },
        }
    }
}

/// Listing entry for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Session identifier.
    pub id: SessionId,
    /// Whether the pipeline has been triggered.
    pub started: bool,
    /// Whether the match has ended.
    pub ended: bool,
    /// Occupancy of each team, in team order.
    pub team_sizes: Vec<usize>,
    /// Seats per team.
    pub team_capacity: usize,
}

/// Everything the engine pushes to clients.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    /// Someone joined the recipient's team. Carries their opaque profile.
    ParticipantJoined {
        /// Client-supplied profile, passed through untouched.
        profile: Value,
    },
    /// The recipient filled the last seat of their team.
    RoleAssigned {
        /// The role signalled.
        role: Role,
    },
    /// All teams are full; the round begins at `scheduled_start`.
    MatchStarting {
        /// When every client should switch to the round view.
        scheduled_start: DateTime<Utc>,
    },
    /// The round has begun for the recipient.
    RoundStarted(RoundBriefing),
    /// A teammate relayed a draw command to the recipient.
    CommandRelayed {
        /// The command, passed through untouched.
        payload: Value,
    },
    /// The match is over.
    MatchEnded(MatchResult),
    /// The match was abandoned before the round could start.
    MatchFailed {
        /// Human-readable cause.
        reason: String,
    },
    /// The set of joinable sessions changed.
    SessionListChanged(Vec<SessionSummary>),
}

impl MatchEvent {
    /// Wire name of the event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ParticipantJoined { .. } => PARTICIPANT_JOINED_EVENT,
            Self::RoleAssigned { .. } => ROLE_ASSIGNED_EVENT,
            Self::MatchStarting { .. } => MATCH_STARTING_EVENT,
            Self::RoundStarted(_) => ROUND_STARTED_EVENT,
            Self::CommandRelayed { .. } => COMMAND_RELAYED_EVENT,
            Self::MatchEnded(_) => MATCH_ENDED_EVENT,
            Self::MatchFailed { .. } => MATCH_FAILED_EVENT,
            Self::SessionListChanged(_) => SESSION_LIST_CHANGED_EVENT,
        }
    }

    /// JSON payload of the event.
    ///
    /// Opaque client values (profiles, draw commands) are forwarded as-is
    /// rather than wrapped.
    #[must_use]
    pub fn payload(&self) -> Value {
        // Serialization of derived Serialize types to Value is infallible.
        match self {
            Self::ParticipantJoined { profile } => profile.clone(),
            Self::CommandRelayed { payload } => payload.clone(),
            Self::RoleAssigned { role } => serde_json::json!({ "role": role }),
            Self::MatchStarting { scheduled_start } => {
                serde_json::json!({ "scheduledStart": scheduled_start })
            }
            Self::RoundStarted(briefing) => {
                serde_json::to_value(briefing).expect("RoundBriefing serialization is infallible")
            }
            Self::MatchEnded(result) => {
                serde_json::to_value(result).expect("MatchResult serialization is infallible")
            }
            Self::MatchFailed { reason } => serde_json::json!({ "reason": reason }),
            Self::SessionListChanged(sessions) => serde_json::to_value(sessions)
                .expect("SessionSummary serialization is infallible"),
        }
    }
}
