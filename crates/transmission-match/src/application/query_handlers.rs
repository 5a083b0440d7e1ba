//! Query handlers for the match context.
//!
//! Read-only views over live sessions. Round details that would give the
//! answer away are withheld until the match has ended.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use transmission_core::error::DomainError;
use transmission_core::ids::{ParticipantId, SessionId};

use super::registry::SessionRegistry;
use crate::domain::events::SessionSummary;
use crate::domain::roles::Role;

/// Read-only view of one seated participant.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    /// Participant identifier.
    pub id: ParticipantId,
    /// Seat within the team.
    pub position: usize,
    /// Role the seat confers.
    pub role: Role,
    /// Client-supplied profile.
    pub profile: Value,
    /// Number of draw commands relayed so far.
    pub command_count: usize,
}

/// Read-only view of a team.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamView {
    /// Team index.
    pub index: usize,
    /// Seats per team.
    pub capacity: usize,
    /// Seated participants, in seat order.
    pub members: Vec<ParticipantView>,
}

/// Read-only view of a session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Session identifier.
    pub id: SessionId,
    /// Whether the pipeline has been triggered.
    pub started: bool,
    /// Whether the match has ended.
    pub ended: bool,
    /// Whether the session still accepts joins.
    pub open: bool,
    /// Teams in index order; empty before the first join.
    pub teams: Vec<TeamView>,
    /// Announced start time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_start: Option<DateTime<Utc>>,
    /// When the match ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Search keyword; revealed once ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    /// Target image index; revealed once ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<usize>,
    /// Vote tallies per candidate, once the round has images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<Vec<u32>>,
}

/// Lists the sessions currently accepting joins.
#[must_use]
pub fn list_open_sessions(registry: &SessionRegistry) -> Vec<SessionSummary> {
    registry.list_open().summaries()
}

/// Retrieves a session by id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no session has that id.
pub fn get_session_by_id(
    registry: &SessionRegistry,
    id: &SessionId,
) -> Result<SessionView, DomainError> {
    let session = registry.get(id)?;
    let ended = session.is_ended();

    let (teams, scheduled_start, ended_at) = session.with_state(|state| {
        let teams = state
            .teams()
            .iter()
            .map(|team| TeamView {
                index: team.index(),
                capacity: team.capacity(),
                members: team
                    .members()
                    .iter()
                    .enumerate()
                    .map(|(position, member)| {
                        let record = state.participant(member);
                        ParticipantView {
                            id: member.clone(),
                            position,
                            role: team.role_at(position),
                            profile: record.map(|r| r.profile.clone()).unwrap_or_default(),
                            command_count: record.map_or(0, |r| r.commands.len()),
                        }
                    })
                    .collect(),
            })
            .collect();
        (teams, state.scheduled_start, state.ended_at)
    });

    let round = session.round();
    Ok(SessionView {
        id: session.id().clone(),
        started: session.is_started(),
        ended,
        open: session.is_open(),
        teams,
        scheduled_start,
        ended_at,
        keyword: round
            .filter(|_| ended)
            .map(|round| round.keyword().to_owned()),
        target: round.filter(|_| ended).map(|round| round.target()),
        votes: round.map(|round| round.images().iter().map(|image| image.votes()).collect()),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use transmission_core::error::DomainError;
    use transmission_core::ids::{ParticipantId, SessionId};
    use transmission_test_support::{MockRng, StaticImageProvider, StepTimer};

    use super::*;
    use crate::application::config::MatchConfig;
    use crate::application::testing::Harness;
    use crate::domain::events::MATCH_ENDED_EVENT;

    fn stepped() -> (Harness<StepTimer>, SessionRegistry) {
        let harness = Harness::new(
            StepTimer::new(),
            MockRng,
            Arc::new(StaticImageProvider::with_count(4)),
        );
        let registry =
            SessionRegistry::new(MatchConfig::default(), harness.services.clone()).unwrap();
        (harness, registry)
    }

    #[test]
    fn test_list_open_sessions_returns_summaries_in_id_order() {
        let (_harness, registry) = stepped();
        registry.create(SessionId::new("b")).unwrap();
        registry.create(SessionId::new("a")).unwrap();

        let listing = list_open_sessions(&registry);

        let ids: Vec<_> = listing.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_get_session_by_id_unknown_is_not_found() {
        let (_harness, registry) = stepped();

        let result = get_session_by_id(&registry, &SessionId::new("missing"));

        assert!(matches!(result.unwrap_err(), DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_view_lists_members_with_roles() {
        let (_harness, registry) = stepped();
        let session = registry.create(SessionId::new("m1")).unwrap();
        session
            .join(0, json!({ "name": "A" }), ParticipantId::new("a"))
            .unwrap();

        let view = get_session_by_id(&registry, &SessionId::new("m1")).unwrap();

        assert!(view.open);
        assert_eq!(view.teams.len(), 1);
        let member = &view.teams[0].members[0];
        assert_eq!(member.id, ParticipantId::new("a"));
        assert_eq!(member.role, Role::Spy);
        assert_eq!(member.profile, json!({ "name": "A" }));
        assert!(view.keyword.is_none());
        assert!(view.votes.is_none());
    }

    #[tokio::test]
    async fn test_view_withholds_answer_until_match_ends() {
        // Arrange
        let (harness, registry) = stepped();
        let session = registry.create(SessionId::new("m1")).unwrap();
        session.join(0, json!({}), ParticipantId::new("a")).unwrap();
        session.join(0, json!({}), ParticipantId::new("b")).unwrap();
        harness.timer.wait_for_sleeps(1).await;
        harness.timer.release(1);
        harness.timer.wait_for_sleeps(2).await;

        // Act
        let live = get_session_by_id(&registry, &SessionId::new("m1")).unwrap();
        session.submit_vote(&ParticipantId::new("b"), 2).unwrap();
        tokio::time::timeout(
            Duration::from_secs(5),
            harness.broadcaster.wait_for(MATCH_ENDED_EVENT, 1),
        )
        .await
        .unwrap();
        let done = get_session_by_id(&registry, &SessionId::new("m1")).unwrap();

        // Assert
        assert!(live.started);
        assert!(live.scheduled_start.is_some());
        assert!(live.keyword.is_none());
        assert!(live.target.is_none());
        assert_eq!(live.votes, Some(vec![0, 0, 0, 0]));

        assert!(done.ended);
        assert!(done.ended_at.is_some());
        assert_eq!(done.keyword.as_deref(), Some("teacher in black car"));
        assert_eq!(done.target, Some(0));
        assert_eq!(done.votes, Some(vec![0, 0, 1, 0]));
    }
}
