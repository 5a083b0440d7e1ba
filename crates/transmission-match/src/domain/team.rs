//! Fixed-capacity team roster.

use transmission_core::error::DomainError;
use transmission_core::ids::ParticipantId;

use super::roles::Role;

/// An ordered roster whose positions determine roles.
#[derive(Debug, Clone)]
pub struct Team {
    index: usize,
    capacity: usize,
    members: Vec<ParticipantId>,
}

impl Team {
    /// Creates an empty team.
    #[must_use]
    pub fn new(index: usize, capacity: usize) -> Self {
        Self {
            index,
            capacity,
            members: Vec::with_capacity(capacity),
        }
    }

    /// Seats `participant` at the next free position and returns it.
    ///
    /// Joining twice is a no-op that returns the existing position.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::TeamFull` if every seat is taken by someone else.
    pub fn join(&mut self, participant: &ParticipantId) -> Result<usize, DomainError> {
        if let Some(position) = self.position_of(participant) {
            return Ok(position);
        }
        if self.is_full() {
            return Err(DomainError::TeamFull {
                team: self.index,
                capacity: self.capacity,
            });
        }
        self.members.push(participant.clone());
        Ok(self.members.len() - 1)
    }

    /// Returns the participant seated at `position`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OutOfRange` if the seat is not occupied yet.
    pub fn member_at(&self, position: usize) -> Result<&ParticipantId, DomainError> {
        self.members.get(position).ok_or(DomainError::OutOfRange {
            what: "team position",
            index: position,
            len: self.members.len(),
        })
    }

    /// Returns the position of `participant`, if seated.
    #[must_use]
    pub fn position_of(&self, participant: &ParticipantId) -> Option<usize> {
        self.members.iter().position(|m| m == participant)
    }

    /// Role held by whoever sits at `position`.
    #[must_use]
    pub fn role_at(&self, position: usize) -> Role {
        Role::for_position(position, self.capacity)
    }

    /// Current occupancy.
    #[must_use]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Seat count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether every seat is taken.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    /// Index of this team within its session.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Members in seat order.
    #[must_use]
    pub fn members(&self) -> &[ParticipantId] {
        &self.members
    }
}
