//! Aggregate state for a single match session.
//!
//! [`MatchState`] holds everything a session mutates under its lock: teams,
//! participant records, and the timestamps the pipeline fills in. Every
//! operation validates before it mutates, so an `Err` leaves the state as it
//! was.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use transmission_core::error::DomainError;
use transmission_core::ids::ParticipantId;

use super::roles::Role;
use super::team::Team;

/// A relay command with the time it was issued.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedCommand {
    /// When the engine accepted the command.
    pub issued_at: DateTime<Utc>,
    /// The command, opaque to the engine.
    pub payload: Value,
}

/// What the session knows about one participant.
#[derive(Debug, Clone)]
pub struct ParticipantRecord {
    /// Index of the team the participant sits in.
    pub team: usize,
    /// Seat within that team.
    pub position: usize,
    /// Client-supplied profile, never interpreted.
    pub profile: Value,
    /// Relay commands issued so far, oldest first.
    pub commands: Vec<TimestampedCommand>,
}

/// Outcome of seating a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seat {
    /// Team index.
    pub team: usize,
    /// Position within the team.
    pub position: usize,
    /// False when the participant was already seated here.
    pub newly_joined: bool,
    /// True when this join took the team's last seat.
    pub filled_team: bool,
}

/// Where an accepted relay command must be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayPlan {
    /// The teammate one seat further along.
    pub recipient: ParticipantId,
    /// Whether this was the sender's first command.
    pub first_command: bool,
}

/// Mutable state of a match session.
#[derive(Debug)]
pub struct MatchState {
    team_count: usize,
    team_capacity: usize,
    teams: Vec<Team>,
    participants: HashMap<ParticipantId, ParticipantRecord>,
    /// Set by the pipeline when the start is announced.
    pub scheduled_start: Option<DateTime<Utc>>,
    /// Set when the match is finalized.
    pub ended_at: Option<DateTime<Utc>>,
}

impl MatchState {
    /// Creates state for a session with `team_count` teams of `team_capacity`
    /// seats. Teams themselves are created on first join.
    #[must_use]
    pub fn new(team_count: usize, team_capacity: usize) -> Self {
        Self {
            team_count,
            team_capacity,
            teams: Vec::new(),
            participants: HashMap::new(),
            scheduled_start: None,
            ended_at: None,
        }
    }

    /// Seats `participant` in `team`.
    ///
    /// Rejoining the same team returns the existing seat with
    /// `newly_joined == false` and changes nothing.
    ///
    /// # Errors
    ///
    /// - `DomainError::OutOfRange` if `team` is not a valid team index.
    /// - `DomainError::AlreadySeated` if the participant sits in another team.
    /// - `DomainError::TeamFull` if the team has no free seat.
    pub fn seat(
        &mut self,
        team: usize,
        participant: &ParticipantId,
        profile: Value,
    ) -> Result<Seat, DomainError> {
        if team >= self.team_count {
            return Err(DomainError::OutOfRange {
                what: "team",
                index: team,
                len: self.team_count,
            });
        }
        if let Some(record) = self.participants.get(participant) {
            if record.team != team {
                return Err(DomainError::AlreadySeated {
                    participant: participant.clone(),
                    team: record.team,
                });
            }
            return Ok(Seat {
                team,
                position: record.position,
                newly_joined: false,
                filled_team: false,
            });
        }

        if self.teams.is_empty() {
            self.teams = (0..self.team_count)
                .map(|index| Team::new(index, self.team_capacity))
                .collect();
        }
        let roster = &mut self.teams[team];
        let position = roster.join(participant)?;
        let filled_team = roster.is_full();

        self.participants.insert(
            participant.clone(),
            ParticipantRecord {
                team,
                position,
                profile,
                commands: Vec::new(),
            },
        );

        Ok(Seat {
            team,
            position,
            newly_joined: true,
            filled_team,
        })
    }

    /// Appends a relay command to `participant`'s log and says where it goes.
    ///
    /// # Errors
    ///
    /// - `DomainError::NotParticipant` if the caller has not joined.
    /// - `DomainError::ForbiddenRole` if the caller holds the handler seat.
    /// - `DomainError::OutOfRange` if the next seat is unoccupied.
    pub fn record_command(
        &mut self,
        participant: &ParticipantId,
        payload: Value,
        issued_at: DateTime<Utc>,
    ) -> Result<RelayPlan, DomainError> {
        let record = self
            .participants
            .get(participant)
            .ok_or_else(|| DomainError::NotParticipant(participant.clone()))?;
        let team = &self.teams[record.team];
        if team.role_at(record.position) == Role::Handler {
            return Err(DomainError::ForbiddenRole(participant.clone()));
        }
        let recipient = team.member_at(record.position + 1)?.clone();

        let record = self
            .participants
            .get_mut(participant)
            .ok_or_else(|| DomainError::NotParticipant(participant.clone()))?;
        record.commands.push(TimestampedCommand { issued_at, payload });

        Ok(RelayPlan {
            recipient,
            first_command: record.commands.len() == 1,
        })
    }

    /// Whether teams exist and every one of them is full.
    #[must_use]
    pub fn all_teams_full(&self) -> bool {
        !self.teams.is_empty() && self.teams.iter().all(Team::is_full)
    }

    /// Occupancy per team, reporting zero for teams not yet created.
    #[must_use]
    pub fn team_sizes(&self) -> Vec<usize> {
        if self.teams.is_empty() {
            return vec![0; self.team_count];
        }
        self.teams.iter().map(Team::size).collect()
    }

    /// The teams, empty until the first join.
    #[must_use]
    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    /// Looks up a participant's record.
    #[must_use]
    pub fn participant(&self, participant: &ParticipantId) -> Option<&ParticipantRecord> {
        self.participants.get(participant)
    }

    /// Number of seated participants.
    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Seats per team.
    #[must_use]
    pub fn team_capacity(&self) -> usize {
        self.team_capacity
    }
}
