//! Match tuning parameters.

use std::time::Duration;

use transmission_core::error::DomainError;

/// Longest duration accepted for any single phase.
const MAX_PHASE: Duration = Duration::from_secs(24 * 60 * 60);

/// Timing and sizing of every session a registry creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchConfig {
    /// Seats per team.
    pub team_capacity: usize,
    /// Teams per session.
    pub team_count: usize,
    /// Pause before announcing the start, so the last joiner can load.
    pub grace_period: Duration,
    /// Distance of the announced start time from the trigger.
    pub start_delay: Duration,
    /// Extra wait after the announced start before briefing roles.
    pub start_lag: Duration,
    /// Length of the round.
    pub match_duration: Duration,
    /// Latency added to a participant's first relay.
    pub first_relay_delay: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            team_capacity: 2,
            team_count: 1,
            grace_period: Duration::from_secs(1),
            start_delay: Duration::from_secs(5),
            start_lag: Duration::from_millis(100),
            match_duration: Duration::from_secs(30),
            first_relay_delay: Duration::from_secs(1),
        }
    }
}

impl MatchConfig {
    /// Checks the configuration is playable.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if a team has fewer than two seats,
    /// there are no teams, or a phase is longer than a day.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.team_capacity < 2 {
            return Err(DomainError::Validation(format!(
                "team capacity must be at least 2, got {}",
                self.team_capacity
            )));
        }
        if self.team_count == 0 {
            return Err(DomainError::Validation(
                "team count must be at least 1".to_owned(),
            ));
        }
        let phases = [
            ("grace_period", self.grace_period),
            ("start_delay", self.start_delay),
            ("start_lag", self.start_lag),
            ("match_duration", self.match_duration),
            ("first_relay_delay", self.first_relay_delay),
        ];
        if let Some((name, _)) = phases.iter().find(|(_, d)| *d > MAX_PHASE) {
            return Err(DomainError::Validation(format!(
                "{name} must not exceed {} seconds",
                MAX_PHASE.as_secs()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MatchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_single_seat_teams_are_rejected() {
        let config = MatchConfig {
            team_capacity: 1,
            ..MatchConfig::default()
        };

        assert!(matches!(
            config.validate().unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn test_zero_teams_are_rejected() {
        let config = MatchConfig {
            team_count: 0,
            ..MatchConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_phase_is_rejected() {
        let config = MatchConfig {
            match_duration: Duration::from_secs(3 * 24 * 60 * 60),
            ..MatchConfig::default()
        };

        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("match_duration"));
    }
}
