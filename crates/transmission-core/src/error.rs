//! Domain error types.

use thiserror::Error;

use crate::ids::{ParticipantId, SessionId};

/// Top-level domain error type.
///
/// Every caller-triggered variant is raised before any state is touched, so
/// a rejected operation leaves the session exactly as it was.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A session with this id already exists.
    #[error("session id already in use: {0}")]
    DuplicateId(SessionId),

    /// No session with this id exists.
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// The requested team has no free position.
    #[error("team {team} is full (capacity {capacity})")]
    TeamFull {
        /// Team index.
        team: usize,
        /// Team capacity.
        capacity: usize,
    },

    /// The match has not started yet.
    #[error("match has not started")]
    NotStarted,

    /// The match has already ended.
    #[error("match has already ended")]
    AlreadyEnded,

    /// The caller's role does not allow the operation.
    #[error("participant {0} holds the handler seat and cannot relay")]
    ForbiddenRole(ParticipantId),

    /// An index does not address an existing element.
    #[error("{what} index {index} out of range (len {len})")]
    OutOfRange {
        /// What was being indexed.
        what: &'static str,
        /// The offending index.
        index: usize,
        /// Number of valid elements.
        len: usize,
    },

    /// The phase pipeline could not prepare the round.
    #[error("match pipeline failed: {0}")]
    PipelineFailed(String),

    /// The participant already holds a seat in another team of this session.
    #[error("participant {participant} is already seated in team {team}")]
    AlreadySeated {
        /// The participant.
        participant: ParticipantId,
        /// The team they occupy.
        team: usize,
    },

    /// The caller has not joined this session.
    #[error("participant {0} has not joined this session")]
    NotParticipant(ParticipantId),

    /// Malformed input or configuration.
    #[error("validation error: {0}")]
    Validation(String),
}
