//! Roles derived from team position.

use serde::{Deserialize, Serialize};

/// A participant's role for the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// First position; sees the target image.
    Spy,
    /// Interior positions; relay only.
    Operator,
    /// Last position; picks among the candidates and cannot relay.
    Handler,
}

impl Role {
    /// Derives the role for `position` in a team of `capacity` seats.
    ///
    /// Position 0 is always the spy, so a single-seat team has no handler.
    /// Capacities below two are rejected by configuration validation.
    #[must_use]
    pub fn for_position(position: usize, capacity: usize) -> Self {
        if position == 0 {
            Self::Spy
        } else if position + 1 >= capacity {
            Self::Handler
        } else {
            Self::Operator
        }
    }
}
